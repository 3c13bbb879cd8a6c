//! Built-in management commands.
//!
//! Each command implements
//! [`ManagementCommand`](crate::command::ManagementCommand) and reads its
//! models from a JSON schema file given with `--schema`.

pub mod check;
pub mod lookups;
pub mod transpile;

use std::path::{Path, PathBuf};

pub use check::CheckCommand;
pub use lookups::LookupsCommand;
pub use transpile::TranspileCommand;

use modeltype_core::{ModelTypeError, ModelTypeResult};
use modeltype_db::ModelRegistry;

use crate::command::CommandRegistry;

/// The option naming the schema file.
pub const SCHEMA_ARG: &str = "schema";

/// Registers all built-in management commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(TranspileCommand));
    registry.register(Box::new(CheckCommand));
    registry.register(Box::new(LookupsCommand));
}

/// The required `--schema <file>` argument.
pub fn schema_arg() -> clap::Arg {
    clap::Arg::new(SCHEMA_ARG)
        .long(SCHEMA_ARG)
        .short('s')
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("JSON schema file listing the models")
}

/// Reads and validates the model registry in the schema file at `path`.
pub fn load_schema(path: &Path) -> ModelTypeResult<ModelRegistry> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        ModelTypeError::ConfigurationError(format!(
            "Failed to read schema file '{}': {e}",
            path.display()
        ))
    })?;
    let registry = ModelRegistry::from_schema_json(&json)?;
    tracing::debug!(path = %path.display(), models = registry.len(), "Loaded schema");
    Ok(registry)
}

/// Loads the registry named by the `--schema` argument in `matches`.
pub fn schema_from_matches(matches: &clap::ArgMatches) -> ModelTypeResult<ModelRegistry> {
    let path = matches
        .get_one::<PathBuf>(SCHEMA_ARG)
        .ok_or_else(|| ModelTypeError::ConfigurationError("--schema is required".to_string()))?;
    load_schema(path)
}
