//! List request parameters.
//!
//! Parameters arrive either as one structured JSON object or as a raw
//! string map (query-string style) where every value is JSON text:
//!
//! ```text
//! query=?{"filters": {"name__in": ["1"]}}
//! order_by=["-number"]
//! page=2
//! exists=true
//! ```

use std::collections::HashMap;

use modeltype_core::{ModelTypeError, ModelTypeResult, Settings, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::predicate::BooleanQuery;
use crate::prefetch::PrefetchTree;

/// Keys recognized in a raw parameter map; anything else is ignored.
pub const PARAM_KEYS: [&str; 11] = [
    "query", "order_by", "order_on", "distinct", "prefetch", "values", "fields", "page",
    "pagesize", "exists", "count",
];

/// Parsed modifiers of a list request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// The boolean query to filter by.
    pub query: Option<BooleanQuery>,
    /// Ordering terms, `-`-prefixed for descending.
    #[serde(alias = "order_on")]
    pub order_by: Option<Vec<String>>,
    /// Fields to de-duplicate on.
    pub distinct: Option<Vec<String>>,
    /// Related objects to load.
    pub prefetch: Option<Vec<PrefetchTree>>,
    /// Field subset to return.
    #[serde(alias = "fields")]
    pub values: Option<Vec<String>>,
    /// The 1-based page to return; pagination is off when absent.
    pub page: Option<usize>,
    /// Rows per page.
    pub pagesize: Option<usize>,
    /// Return whether any row matches.
    pub exists: bool,
    /// Return the number of matching rows.
    pub count: bool,
}

impl ListParams {
    /// Parses parameters from a structured JSON object.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for values of the wrong shape or a zero
    /// `page`/`pagesize`.
    pub fn from_value(value: Value) -> ModelTypeResult<Self> {
        let params: Self = serde_json::from_value(value).map_err(|e| {
            ModelTypeError::ValidationError(ValidationError::new(
                format!("Invalid list parameters: {e}"),
                "invalid",
            ))
        })?;
        params.check()?;
        Ok(params)
    }

    /// Parses parameters from a raw string map whose values are JSON text.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` keyed by the offending parameter when its
    /// value is not valid JSON.
    pub fn from_query_map(raw: &HashMap<String, String>) -> ModelTypeResult<Self> {
        let mut object = serde_json::Map::new();
        for key in PARAM_KEYS {
            let Some(text) = raw.get(key) else {
                continue;
            };
            let text = if key == "query" {
                text.trim_start_matches('\u{feff}')
            } else {
                text.as_str()
            };
            let value: Value = serde_json::from_str(text).map_err(|e| {
                ModelTypeError::ValidationError(ValidationError::for_field(
                    key,
                    format!("Invalid JSON: {e}"),
                    "invalid",
                ))
            })?;
            object.insert(key.to_string(), value);
        }
        Self::from_value(Value::Object(object))
    }

    /// Returns `true` when a page was requested.
    pub const fn is_paginated(&self) -> bool {
        self.page.is_some()
    }

    /// Returns the page size to use, falling back to the configured default
    /// and clamped to the configured maximum.
    pub fn page_size(&self, settings: &Settings) -> usize {
        settings.effective_page_size(self.pagesize)
    }

    fn check(&self) -> ModelTypeResult<()> {
        for (key, value) in [("page", self.page), ("pagesize", self.pagesize)] {
            if value == Some(0) {
                return Err(ModelTypeError::ValidationError(ValidationError::for_field(
                    key,
                    "Ensure this value is greater than or equal to 1.",
                    "min_value",
                )));
            }
        }
        Ok(())
    }
}
