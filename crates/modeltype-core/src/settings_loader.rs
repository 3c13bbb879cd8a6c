//! Settings loading from configuration files.
//!
//! This module provides functions to load [`Settings`] from TOML files, JSON
//! files, and to apply environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `MODELTYPE_DEBUG` | `debug` |
//! | `MODELTYPE_LOG_LEVEL` | `log_level` |
//! | `MODELTYPE_LOG_FORMAT` | `log_format` |
//! | `MODELTYPE_TRANSPILE_DEST` | `transpile_dest` |
//! | `MODELTYPE_DEFAULT_PAGE_SIZE` | `default_page_size` |
//! | `MODELTYPE_MAX_PAGE_SIZE` | `max_page_size` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use modeltype_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file("modeltype.toml").unwrap();
//! let settings = settings_loader::from_toml_file_with_env("modeltype.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::ModelTypeError;
use crate::settings::{LogFormat, Settings};

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, ModelTypeError> {
    // Deserialize into a JSON value first and merge it over the defaults, so
    // partially specified files keep every other default.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| ModelTypeError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, ModelTypeError> {
    let content = read_config(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, ModelTypeError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, ModelTypeError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| ModelTypeError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, ModelTypeError> {
    let content = read_config(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, ModelTypeError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a file, choosing the format by extension (`.json`
/// is JSON, anything else TOML), then applies environment overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, ModelTypeError> {
    let path = path.as_ref();
    if path.extension().is_some_and(|ext| ext == "json") {
        from_json_file_with_env(path)
    } else {
        from_toml_file_with_env(path)
    }
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies environment variable overrides to a settings struct.
///
/// Unparseable numeric values and unknown log formats are ignored and the
/// previous value is kept.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("MODELTYPE_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("MODELTYPE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(format) = std::env::var("MODELTYPE_LOG_FORMAT")
        .ok()
        .and_then(|val| LogFormat::parse(&val))
    {
        settings.log_format = format;
    }

    if let Ok(val) = std::env::var("MODELTYPE_TRANSPILE_DEST") {
        settings.transpile_dest = PathBuf::from(val);
    }

    if let Ok(val) = std::env::var("MODELTYPE_DEFAULT_PAGE_SIZE") {
        if let Ok(size) = val.parse::<usize>() {
            settings.default_page_size = size;
        }
    }

    if let Ok(val) = std::env::var("MODELTYPE_MAX_PAGE_SIZE") {
        if let Ok(size) = val.parse::<usize>() {
            settings.max_page_size = Some(size);
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, ModelTypeError> {
    std::fs::read_to_string(path).map_err(|e| {
        ModelTypeError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(
    value: serde_json::Value,
    format: &str,
) -> Result<Settings, ModelTypeError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        ModelTypeError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    let settings: Settings = serde_json::from_value(merged).map_err(|e| {
        ModelTypeError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })?;

    if settings.default_page_size == 0 {
        return Err(ModelTypeError::ConfigurationError(
            "default_page_size must be greater than zero".to_string(),
        ));
    }
    Ok(settings)
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
