//! Core error types for modeltype.
//!
//! This module provides the error enum [`ModelTypeError`] that covers
//! generation-time configuration errors, request-time validation errors,
//! missing rows, data-store failures, and I/O. Generation-time errors are fatal
//! for a whole transpile run; request-time errors are scoped to one request.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Represents a validation error with optional field-level errors.
///
/// Validation errors can be either simple (a single message) or compound
/// (containing per-field error lists). They are produced when a request
/// parameter is malformed or when a model validator rejects submitted values.
///
/// # Examples
///
/// ```
/// use modeltype_core::error::ValidationError;
///
/// // Simple validation error
/// let err = ValidationError::new("Expected a JSON array.", "invalid");
///
/// // Field-level validation errors
/// let mut field_errors = std::collections::HashMap::new();
/// field_errors.insert(
///     "name".to_string(),
///     vec![ValidationError::new("Name invalid.", "invalid")],
/// );
/// let err = ValidationError::with_field_errors(field_errors);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the type of validation failure (e.g. "required", "invalid").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: HashMap<String, String>,
    /// Per-field validation errors, keyed by field name.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Creates a `ValidationError` for a single field.
    pub fn for_field(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), vec![Self::new(message, code)]);
        Self::with_field_errors(field_errors)
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Renders this error as a JSON object suitable for a structured rejection.
    ///
    /// Simple errors become `{"detail": message, "code": code}`; field errors
    /// become `{field: [message, ...]}`.
    pub fn to_json(&self) -> serde_json::Value {
        if self.field_errors.is_empty() {
            return serde_json::json!({ "detail": self.message, "code": self.code });
        }
        let map: serde_json::Map<String, serde_json::Value> = self
            .field_errors
            .iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| serde_json::Value::String(e.to_string()))
                    .collect();
                (field.clone(), serde_json::Value::Array(messages))
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)?;
        } else if !self.field_errors.is_empty() {
            let mut fields: Vec<_> = self.field_errors.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let mut first = true;
            for (field, errors) in fields {
                for error in errors {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{field}: {error}")?;
                    first = false;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for modeltype.
///
/// Each variant maps to an HTTP-style status code via
/// [`ModelTypeError::status_code`] so that a transport layer can surface a
/// structured rejection without inspecting the message.
#[derive(Error, Debug)]
pub enum ModelTypeError {
    // ── Request errors ───────────────────────────────────────────────

    /// A request was malformed in a way that is not a field validation failure.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// One or more request parameters or submitted values failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Lookup errors ────────────────────────────────────────────────

    /// A row requested by primary key does not exist.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// A query expected exactly one result but found multiple.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A field path segment does not name a field on the model reached so far.
    #[error("Field does not exist: {0}")]
    FieldDoesNotExist(String),

    // ── Data store ───────────────────────────────────────────────────

    /// A generic data-store error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value or schema definition is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A model or model type is improperly configured.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Generation ───────────────────────────────────────────────────

    /// Generating a schema unit failed.
    #[error("Transpile error: {0}")]
    TranspileError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ModelTypeError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest`, `ValidationError`, `FieldDoesNotExist` -> 400
    /// - `DoesNotExist` -> 404
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::ValidationError(_) | Self::FieldDoesNotExist(_) => 400,
            Self::DoesNotExist(_) => 404,
            Self::MultipleObjectsReturned(_)
            | Self::DatabaseError(_)
            | Self::ConfigurationError(_)
            | Self::ImproperlyConfigured(_)
            | Self::TranspileError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Returns `true` for errors raised while building schemas or generating
    /// artifacts, which abort the whole generation pass.
    pub const fn is_generation_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationError(_) | Self::ImproperlyConfigured(_) | Self::TranspileError(_)
        )
    }

    /// Shorthand for a simple request validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::ValidationError(ValidationError::new(message, "invalid"))
    }
}

impl From<ValidationError> for ModelTypeError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

impl From<serde_json::Error> for ModelTypeError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, ModelTypeError>`.
pub type ModelTypeResult<T> = Result<T, ModelTypeError>;
