//! The `lookups` management command.
//!
//! Prints every lookup key a generated client accepts for one model, with
//! its TypeScript type.

use async_trait::async_trait;
use modeltype_core::{ModelTypeResult, Settings};
use modeltype_db::ModelRegistry;
use modeltype_transpile::{FieldTypeMap, ModelTypeTranspiler};

use super::{schema_arg, schema_from_matches};
use crate::command::ManagementCommand;

/// Lists the lookup keys of a model.
pub struct LookupsCommand;

/// Returns `(key, type)` pairs for `model`, in generation order.
pub fn lookup_table(
    registry: &ModelRegistry,
    settings: &Settings,
    model: &str,
) -> ModelTypeResult<Vec<(String, String)>> {
    let def = registry.model(model)?;
    let pool = registry.full_pool();
    let types = FieldTypeMap::from_settings(settings);
    let unit = ModelTypeTranspiler::new(&pool, &types).transpile(def)?;
    Ok(unit
        .lookups
        .into_iter()
        .map(|decl| (decl.name, decl.ts_type))
        .collect())
}

#[async_trait]
impl ManagementCommand for LookupsCommand {
    fn name(&self) -> &'static str {
        "lookups"
    }

    fn help(&self) -> &'static str {
        "List the lookup keys of a model"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(schema_arg()).arg(
            clap::Arg::new("model")
                .required(true)
                .help("The model to list lookups for"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> ModelTypeResult<()> {
        let registry = schema_from_matches(matches)?;
        let model = matches
            .get_one::<String>("model")
            .map_or("", String::as_str);
        for (key, ts_type) in lookup_table(&registry, settings, model)? {
            println!("{key}: {ts_type}");
        }
        Ok(())
    }
}
