//! The `transpile` management command.
//!
//! Generates `models.ts` and `schema.json` for the models of a schema file.

use std::path::PathBuf;

use async_trait::async_trait;
use modeltype_core::{ModelTypeResult, Settings};
use modeltype_db::ModelRegistry;
use modeltype_transpile::{TranspileReport, Transpiler};

use super::{schema_arg, schema_from_matches};
use crate::command::ManagementCommand;

/// Generates TypeScript artifacts for a pool of models.
pub struct TranspileCommand;

/// Options of one `transpile` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranspileOptions {
    /// Overrides `Settings::transpile_dest`.
    pub out: Option<PathBuf>,
    /// Restricts the pool; every model when empty.
    pub models: Vec<String>,
}

impl TranspileOptions {
    fn from_matches(matches: &clap::ArgMatches) -> Self {
        Self {
            out: matches.get_one::<PathBuf>("out").cloned(),
            models: matches
                .get_many::<String>("models")
                .map_or_else(Vec::new, |names| names.cloned().collect()),
        }
    }
}

/// Runs generation for `registry` with `options` applied over `settings`.
pub fn run_transpile(
    registry: &ModelRegistry,
    settings: &Settings,
    options: &TranspileOptions,
) -> ModelTypeResult<TranspileReport> {
    let mut transpiler = Transpiler::new(registry, settings);
    if let Some(out) = &options.out {
        transpiler = transpiler.with_dest(out);
    }
    if !options.models.is_empty() {
        transpiler = transpiler.with_models(options.models.iter().cloned());
    }
    transpiler.transpile()
}

#[async_trait]
impl ManagementCommand for TranspileCommand {
    fn name(&self) -> &'static str {
        "transpile"
    }

    fn help(&self) -> &'static str {
        "Generate TypeScript model types and the field schema"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(schema_arg())
            .arg(
                clap::Arg::new("out")
                    .long("out")
                    .short('o')
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Output directory (defaults to transpile_dest)"),
            )
            .arg(
                clap::Arg::new("models")
                    .long("models")
                    .value_delimiter(',')
                    .help("Comma-separated models to generate (defaults to all)"),
            )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> ModelTypeResult<()> {
        let registry = schema_from_matches(matches)?;
        let options = TranspileOptions::from_matches(matches);
        let report = run_transpile(&registry, settings, &options)?;
        for path in &report.written {
            tracing::info!("Wrote {}", path.display());
        }
        Ok(())
    }
}
