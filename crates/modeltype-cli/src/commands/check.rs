//! The `check` management command.
//!
//! Validates a schema file and the settings against it without writing
//! anything: every model must generate, type overrides should match
//! something, and custom kinds should have an override.

use std::collections::BTreeSet;

use async_trait::async_trait;
use modeltype_core::{ModelTypeError, ModelTypeResult, Settings};
use modeltype_db::{Field, FieldKind, ModelRegistry};
use modeltype_transpile::field_type::ANY;
use modeltype_transpile::{FieldTypeMap, ModelTypeTranspiler};

use super::{schema_arg, schema_from_matches};
use crate::command::ManagementCommand;

/// Runs system checks against a schema and the settings.
pub struct CheckCommand;

/// The result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMessage {
    /// The severity level of this check result.
    pub level: CheckLevel,
    /// A human-readable description of the issue.
    pub msg: String,
    /// An optional hint for how to resolve the issue.
    pub hint: Option<String>,
    /// A unique identifier for this check (e.g. "models.E001").
    pub id: String,
}

/// Severity levels for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
    /// Informational message.
    Info,
    /// A warning that may indicate a problem.
    Warning,
    /// An error that must be resolved.
    Error,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

fn message(level: CheckLevel, id: &str, msg: String, hint: Option<String>) -> CheckMessage {
    CheckMessage {
        level,
        msg,
        hint,
        id: id.to_string(),
    }
}

/// Runs every check for `registry` under `settings`.
pub fn run_checks(registry: &ModelRegistry, settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();
    let types = FieldTypeMap::from_settings(settings);
    let pool = registry.full_pool();
    let transpiler = ModelTypeTranspiler::new(&pool, &types);

    // Every model must generate.
    for model in registry.models() {
        if let Err(e) = transpiler.transpile(model) {
            messages.push(message(
                CheckLevel::Error,
                "models.E001",
                format!("'{}' cannot be generated: {e}", model.name),
                None,
            ));
        }
    }

    let mut known_keys = BTreeSet::new();
    for model in registry.models() {
        for field in &model.fields {
            let Field::Concrete(f) = field else { continue };
            known_keys.insert(f.kind.name().to_string());
            if let Some(serializer) = &f.serializer {
                known_keys.insert(serializer.clone());
            }
            if let FieldKind::Custom { name } = &f.kind {
                if types.resolve_field(f, None) == ANY {
                    messages.push(message(
                        CheckLevel::Warning,
                        "models.W001",
                        format!(
                            "'{}.{}' has custom kind '{name}' and will be typed as '{ANY}'",
                            model.name, f.name
                        ),
                        Some(format!("Add '{name}' to field_types")),
                    ));
                }
            }
        }
    }

    let mut unused: Vec<&String> = settings
        .field_types
        .keys()
        .filter(|key| !known_keys.contains(*key))
        .collect();
    unused.sort();
    for key in unused {
        messages.push(message(
            CheckLevel::Info,
            "settings.I001",
            format!("field_types entry '{key}' matches no field kind or serializer"),
            None,
        ));
    }

    if settings.default_page_size == 0 {
        messages.push(message(
            CheckLevel::Error,
            "settings.E001",
            "default_page_size is 0".to_string(),
            Some("Set default_page_size to at least 1".to_string()),
        ));
    }
    if let Some(max) = settings.max_page_size {
        if max < settings.default_page_size {
            messages.push(message(
                CheckLevel::Warning,
                "settings.W001",
                format!(
                    "max_page_size ({max}) is below default_page_size ({})",
                    settings.default_page_size
                ),
                None,
            ));
        }
    }

    messages
}

#[async_trait]
impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Validate a schema file and the settings"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(schema_arg())
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> ModelTypeResult<()> {
        let registry = schema_from_matches(matches)?;
        let messages = run_checks(&registry, settings);

        if messages.is_empty() {
            tracing::info!("System check identified no issues");
            return Ok(());
        }

        let errors = messages.iter().filter(|m| m.level >= CheckLevel::Error).count();
        let warnings = messages.iter().filter(|m| m.level == CheckLevel::Warning).count();

        for msg in &messages {
            let hint_text = msg
                .hint
                .as_ref()
                .map_or(String::new(), |h| format!("\n\tHINT: {h}"));
            tracing::warn!("{} ({}): {}{}", msg.level, msg.id, msg.msg, hint_text);
        }

        tracing::info!(
            "System check identified {} issue(s) ({} error(s), {} warning(s))",
            messages.len(),
            errors,
            warnings
        );

        if errors > 0 {
            return Err(ModelTypeError::ConfigurationError(format!(
                "System check found {errors} error(s)"
            )));
        }
        Ok(())
    }
}
