//! Model methods.
//!
//! A [`MethodDef`] declares a callable that clients may invoke on a model:
//! its name, its typed arguments, and whether it runs against one row
//! (instance method) or against the model as a whole (static method). The
//! declaration is plain data, so it can live in a schema file and drive code
//! generation on its own. The code that runs is a [`MethodHandler`],
//! registered separately on the
//! [`ModelRegistryBuilder`](crate::model::ModelRegistryBuilder).

use std::fmt;
use std::sync::Arc;

use modeltype_core::{ModelTypeError, ModelTypeResult, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::ConcreteField;
use crate::queryable::Record;

/// Names that generated clients already use on model and queryset types.
pub const RESERVED_METHOD_NAMES: [&str; 13] = [
    "create",
    "count",
    "delete",
    "exclude",
    "exists",
    "fetch",
    "filter",
    "get",
    "getOrCreate",
    "orderBy",
    "prefetch",
    "update",
    "values",
];

/// The declaration of a model method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    /// The method name.
    pub name: String,
    /// The arguments, typed like concrete fields. Nullable arguments may be
    /// omitted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ConcreteField>,
    /// Whether the method runs without a row.
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl MethodDef {
    /// Declares a method that runs against one row.
    pub fn instance(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            is_static: false,
        }
    }

    /// Declares a method that runs without a row.
    pub fn static_method(name: impl Into<String>) -> Self {
        Self {
            is_static: true,
            ..Self::instance(name)
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: ConcreteField) -> Self {
        self.args.push(arg);
        self
    }

    /// Checks submitted arguments against the declaration and returns them
    /// with every omitted nullable argument set to `null`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` keyed by each offending argument: unknown
    /// names, missing or null non-nullable arguments, and values outside an
    /// argument's choices.
    pub fn bind_args(&self, submitted: Record) -> ModelTypeResult<Record> {
        let mut errors = std::collections::HashMap::new();
        let mut reject = |name: &str, message: &str, code: &str| {
            errors
                .entry(name.to_string())
                .or_insert_with(Vec::new)
                .push(ValidationError::new(message, code));
        };

        for name in submitted.keys() {
            if !self.args.iter().any(|a| &a.name == name) {
                reject(name, "Unexpected argument.", "unexpected");
            }
        }

        let mut bound = Record::new();
        for arg in &self.args {
            let value = submitted.get(&arg.name).cloned();
            match value {
                None if !arg.null => reject(&arg.name, "This argument is required.", "required"),
                Some(Value::Null) if !arg.null => {
                    reject(&arg.name, "This argument may not be null.", "null");
                }
                Some(ref v)
                    if !v.is_null()
                        && !arg.choices.is_empty()
                        && !arg.choices.iter().any(|c| &c.value == v) =>
                {
                    reject(&arg.name, "Not a valid choice.", "invalid_choice");
                }
                _ => {}
            }
            bound.insert(arg.name.clone(), value.unwrap_or(Value::Null));
        }

        if errors.is_empty() {
            Ok(bound)
        } else {
            Err(ValidationError::with_field_errors(errors).into())
        }
    }
}

type MethodFn = dyn Fn(Option<&Record>, &Record) -> ModelTypeResult<Value> + Send + Sync;

/// The code behind a declared method.
///
/// The handler receives the target row (`None` for static methods) and the
/// bound arguments, and returns the method's JSON result.
///
/// # Examples
///
/// ```
/// use modeltype_db::methods::MethodHandler;
/// use modeltype_db::Record;
/// use serde_json::{json, Value};
///
/// let handler = MethodHandler::new(|row, _args| {
///     Ok(row.and_then(|r| r.get("name")).cloned().unwrap_or(Value::Null))
/// });
/// let row = json!({"name": "a"}).as_object().unwrap().clone();
/// assert_eq!(handler.call(Some(&row), &Record::new()).unwrap(), json!("a"));
/// ```
#[derive(Clone)]
pub struct MethodHandler {
    run: Arc<MethodFn>,
}

impl MethodHandler {
    /// Wraps `run`.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(Option<&Record>, &Record) -> ModelTypeResult<Value> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run) }
    }

    /// Runs the method.
    pub fn call(&self, row: Option<&Record>, args: &Record) -> ModelTypeResult<Value> {
        (self.run)(row, args)
    }
}

impl fmt::Debug for MethodHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandler").finish_non_exhaustive()
    }
}

/// Returns an error if `name` is reserved for generated client members.
pub(crate) fn check_method_name(model: &str, name: &str) -> ModelTypeResult<()> {
    if RESERVED_METHOD_NAMES.contains(&name) {
        return Err(ModelTypeError::ConfigurationError(format!(
            "Method '{name}' on '{model}' shadows a generated client member"
        )));
    }
    Ok(())
}
