//! Model validators.
//!
//! A [`ModelValidator`] declares the field names it reads and a check over the
//! submitted values. Declared names are verified against the model when the
//! [`ModelRegistry`](crate::model::ModelRegistry) is built, so a typo is a
//! configuration error at startup rather than a silent no-op per request.

use std::fmt;
use std::sync::Arc;

use modeltype_core::{ModelTypeError, ModelTypeResult, ValidationError};
use serde_json::Value;

use crate::queryable::Record;

type CheckFn = dyn Fn(&Record) -> Result<(), ValidationError> + Send + Sync;

/// A validator over a subset of a model's submitted values.
///
/// # Examples
///
/// ```
/// use modeltype_db::validators::ModelValidator;
/// use modeltype_core::ValidationError;
///
/// let validator = ModelValidator::new(["name"], |values| {
///     match values.get("name").and_then(|v| v.as_str()) {
///         Some(name) if name.is_empty() => Err(ValidationError::for_field(
///             "name", "Name may not be blank.", "blank",
///         )),
///         _ => Ok(()),
///     }
/// });
/// assert_eq!(validator.fields(), ["name"]);
/// ```
#[derive(Clone)]
pub struct ModelValidator {
    fields: Vec<String>,
    check: Arc<CheckFn>,
}

impl ModelValidator {
    /// Creates a validator reading `fields`.
    pub fn new<I, S, F>(fields: I, check: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Record) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            check: Arc::new(check),
        }
    }

    /// Returns the declared field names.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Runs the check over `submitted`.
    ///
    /// Only the declared fields are passed to the check; any that were not
    /// submitted are passed as `null`.
    pub fn validate(&self, submitted: &Record) -> ModelTypeResult<()> {
        let values: Record = self
            .fields
            .iter()
            .map(|name| {
                let value = submitted.get(name).cloned().unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();
        (self.check)(&values).map_err(ModelTypeError::ValidationError)
    }
}

impl fmt::Debug for ModelValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelValidator")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
