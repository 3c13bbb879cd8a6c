//! Settings for modeltype.
//!
//! [`Settings`] holds the configuration consumed by schema generation and
//! request handling. Unlike a process-wide settings object, a `Settings` value
//! is passed explicitly to the components that need it so that concurrent
//! generation runs and requests stay isolated.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The default number of rows per page for paginated payloads.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// How log lines are formatted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-readable output.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// One JSON object per event, for log shippers.
    Json,
}

impl LogFormat {
    /// Parses a format name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// The complete set of modeltype settings.
///
/// # Examples
///
/// ```
/// use modeltype_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.default_page_size, 25);
/// assert!(settings.field_types.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled. Log lines then carry their target and
    /// source location.
    pub debug: bool,

    /// The log level filter (e.g. "info", "debug", "modeltype_query=trace").
    pub log_level: String,

    /// The log line format.
    pub log_format: LogFormat,

    // ── Generation ───────────────────────────────────────────────────

    /// Directory that generated artifacts are published into.
    pub transpile_dest: PathBuf,

    /// User-supplied type overrides, keyed by field kind name (e.g.
    /// `"CharField"`) or by custom serializer name. Values are emitted
    /// verbatim as the target type.
    pub field_types: HashMap<String, String>,

    // ── Requests ─────────────────────────────────────────────────────

    /// Page size used when a paginated request omits `pagesize`.
    pub default_page_size: usize,

    /// Optional upper bound applied to requested page sizes.
    pub max_page_size: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            transpile_dest: PathBuf::from("ts"),
            field_types: HashMap::new(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
        }
    }
}

impl Settings {
    /// Returns the page size to use for a request that asked for `requested`.
    pub fn effective_page_size(&self, requested: Option<usize>) -> usize {
        let size = requested.unwrap_or(self.default_page_size);
        match self.max_page_size {
            Some(max) => size.min(max),
            None => size,
        }
    }
}
