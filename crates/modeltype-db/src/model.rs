//! Model definitions and the model registry.
//!
//! A [`ModelDef`] is a plain record: a name, an ordered list of [`Field`]s,
//! and optional read-only property names. Models are registered through a
//! [`ModelRegistryBuilder`], which validates relation targets and primary
//! keys, synthesizes reverse relations, and checks validator declarations.
//! The resulting [`ModelRegistry`] is immutable and is passed explicitly to
//! whatever needs it; there is no process-wide registry.
//!
//! Models may also declare [`MethodDef`]s. The code behind each one is a
//! [`MethodHandler`] registered on the builder, which rejects handlers for
//! undeclared methods.
//!
//! A [`ModelPool`] is the closed subset of registered models participating in
//! one generation pass. Relations to models outside the pool degrade to opaque
//! references.

use std::collections::{BTreeSet, HashMap};

use modeltype_core::{ModelTypeError, ModelTypeResult};
use serde::{Deserialize, Serialize};

use crate::fields::{ConcreteField, Field, FieldKind, ReverseRelationField};
use crate::methods::{check_method_name, MethodDef, MethodHandler};
use crate::queryable::Record;
use crate::validators::ModelValidator;

/// The definition of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    /// The model name, e.g. `"Thing"`.
    pub name: String,
    /// The owning application, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_label: Option<String>,
    /// The model's fields, in declaration order.
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Names of read-only computed properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    /// Methods callable by clients.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodDef>,
}

impl ModelDef {
    /// Creates an empty model definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app_label: None,
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Sets the application label.
    #[must_use]
    pub fn app_label(mut self, label: impl Into<String>) -> Self {
        self.app_label = Some(label.into());
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: impl Into<Field>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Appends a read-only property name.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.properties.push(name.into());
        self
    }

    /// Declares a method.
    #[must_use]
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Returns the method with the given name.
    pub fn get_method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Returns the field with the given name.
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Returns the field whose name or attname is `name`.
    pub fn get_field_or_attname(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name() == name || f.attname().is_some_and(|a| a == name))
    }

    /// The storage column of the primary key: the field name for concrete
    /// keys, the attname for one-to-one keys.
    pub fn pk_column(&self) -> ModelTypeResult<String> {
        match self.fields.iter().find(|f| f.is_primary_key()) {
            Some(Field::Concrete(f)) => Ok(f.name.clone()),
            Some(Field::ForwardRelation(f)) => Ok(f.attname()),
            _ => Err(ModelTypeError::ImproperlyConfigured(format!(
                "Model '{}' has no primary key",
                self.name
            ))),
        }
    }

    /// Returns the storage column written for `key`, which may be a field
    /// name or a forward relation's attname. Reverse relations and unknown
    /// names have no column.
    pub fn column(&self, key: &str) -> Option<String> {
        match self.get_field_or_attname(key)? {
            Field::Concrete(f) => Some(f.name.clone()),
            Field::ForwardRelation(f) => Some(f.attname()),
            Field::ManyToMany(f) => Some(f.name.clone()),
            Field::ReverseRelation(_) => None,
        }
    }
}

/// The on-disk schema file format: `{"models": [ModelDef, ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    /// Model definitions in registration order.
    pub models: Vec<ModelDef>,
}

/// An immutable set of validated model definitions.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDef>,
    index: HashMap<String, usize>,
    validators: HashMap<String, Vec<ModelValidator>>,
    handlers: HashMap<(String, String), MethodHandler>,
}

impl ModelRegistry {
    /// Returns a new builder.
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// Builds a registry from a JSON schema file's contents.
    pub fn from_schema_json(json: &str) -> ModelTypeResult<Self> {
        let schema: SchemaFile = serde_json::from_str(json).map_err(|e| {
            ModelTypeError::ConfigurationError(format!("Invalid schema file: {e}"))
        })?;
        schema
            .models
            .into_iter()
            .fold(Self::builder(), ModelRegistryBuilder::register)
            .build()
    }

    /// Returns the model with the given name.
    pub fn get(&self, name: &str) -> Option<&ModelDef> {
        self.index.get(name).map(|&i| &self.models[i])
    }

    /// Returns the model with the given name, or an `ImproperlyConfigured` error.
    pub fn model(&self, name: &str) -> ModelTypeResult<&ModelDef> {
        self.get(name).ok_or_else(|| {
            ModelTypeError::ImproperlyConfigured(format!("Model '{name}' is not registered"))
        })
    }

    /// Iterates over all models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.iter()
    }

    /// Returns the number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns `true` if no models are registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Returns the validators registered for `model`.
    pub fn validators(&self, model: &str) -> &[ModelValidator] {
        self.validators.get(model).map_or(&[], Vec::as_slice)
    }

    /// Runs every validator registered for `model` over `submitted`.
    ///
    /// A forward relation submitted under its name is also visible to
    /// validators under its attname, and the reverse.
    pub fn validate(&self, model: &str, submitted: &Record) -> ModelTypeResult<()> {
        let validators = self.validators(model);
        if validators.is_empty() {
            return Ok(());
        }
        let mut values = submitted.clone();
        if let Some(def) = self.get(model) {
            for field in &def.fields {
                let Field::ForwardRelation(f) = field else {
                    continue;
                };
                let attname = f.attname();
                if let Some(v) = submitted.get(&f.name) {
                    values.entry(attname).or_insert_with(|| v.clone());
                } else if let Some(v) = submitted.get(&attname) {
                    values.insert(f.name.clone(), v.clone());
                }
            }
        }
        validators
            .iter()
            .try_for_each(|validator| validator.validate(&values))
    }

    /// Returns the handler registered for `model.method`.
    pub fn method_handler(&self, model: &str, method: &str) -> Option<&MethodHandler> {
        self.handlers.get(&(model.to_string(), method.to_string()))
    }

    /// Returns a pool containing every registered model.
    pub fn full_pool(&self) -> ModelPool<'_> {
        ModelPool {
            registry: self,
            members: self.models.iter().map(|m| m.name.clone()).collect(),
        }
    }

    /// Returns a pool restricted to the named models.
    pub fn pool<S: AsRef<str>>(&self, names: &[S]) -> ModelTypeResult<ModelPool<'_>> {
        let members = names
            .iter()
            .map(|name| self.model(name.as_ref()).map(|m| m.name.clone()))
            .collect::<ModelTypeResult<BTreeSet<_>>>()?;
        Ok(ModelPool {
            registry: self,
            members,
        })
    }

    /// Resolves the scalar kind of `model`'s primary key.
    ///
    /// When the primary key is itself a one-to-one relation, the kind is
    /// resolved through the chain of related primary keys.
    pub fn pk_kind(&self, model: &str) -> ModelTypeResult<FieldKind> {
        let mut current = model;
        for _ in 0..=self.models.len() {
            let def = self.model(current)?;
            match def.fields.iter().find(|f| f.is_primary_key()) {
                Some(Field::Concrete(f)) => return Ok(f.kind.clone()),
                Some(Field::ForwardRelation(f)) => current = &f.to,
                _ => {
                    return Err(ModelTypeError::ImproperlyConfigured(format!(
                        "Model '{current}' has no primary key"
                    )))
                }
            }
        }
        Err(ModelTypeError::ImproperlyConfigured(format!(
            "Primary key of '{model}' forms a relation cycle"
        )))
    }
}

/// The closed set of models participating in one generation or query pass.
#[derive(Debug, Clone)]
pub struct ModelPool<'a> {
    registry: &'a ModelRegistry,
    members: BTreeSet<String>,
}

impl<'a> ModelPool<'a> {
    /// Returns the backing registry.
    pub const fn registry(&self) -> &'a ModelRegistry {
        self.registry
    }

    /// Returns `true` if `model` is in the pool.
    pub fn contains(&self, model: &str) -> bool {
        self.members.contains(model)
    }

    /// Iterates over the pool's models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &'a ModelDef> + '_ {
        self.registry
            .models()
            .filter(|m| self.members.contains(&m.name))
    }

    /// Returns the number of models in the pool.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Accumulates model definitions and validators, then validates them as a set.
#[derive(Debug, Default)]
pub struct ModelRegistryBuilder {
    models: Vec<ModelDef>,
    validators: Vec<(String, ModelValidator)>,
    handlers: Vec<(String, String, MethodHandler)>,
}

impl ModelRegistryBuilder {
    /// Registers a model.
    #[must_use]
    pub fn register(mut self, model: ModelDef) -> Self {
        self.models.push(model);
        self
    }

    /// Registers a validator for `model`.
    #[must_use]
    pub fn validator(mut self, model: impl Into<String>, validator: ModelValidator) -> Self {
        self.validators.push((model.into(), validator));
        self
    }

    /// Registers the handler behind the method `name` declared on `model`.
    #[must_use]
    pub fn method_handler(
        mut self,
        model: impl Into<String>,
        name: impl Into<String>,
        handler: MethodHandler,
    ) -> Self {
        self.handlers.push((model.into(), name.into(), handler));
        self
    }

    /// Validates the registered models and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for duplicate model or field names, more
    /// than one primary key, relation targets that are not registered,
    /// explicitly declared reverse relations, reverse-name collisions,
    /// validators that name fields the model does not have, methods that
    /// clash with fields or generated client members, and handlers for
    /// undeclared methods.
    pub fn build(self) -> ModelTypeResult<ModelRegistry> {
        let mut models = self.models;
        let mut index = HashMap::new();

        for (i, model) in models.iter_mut().enumerate() {
            if index.insert(model.name.clone(), i).is_some() {
                return Err(config_error(format!(
                    "Model '{}' is registered twice",
                    model.name
                )));
            }
            check_fields(model)?;
            ensure_primary_key(model)?;
        }

        let reverse = reverse_relations(&models, &index)?;
        for (target, field) in reverse {
            let model = &mut models[target];
            if model.get_field_or_attname(&field.name).is_some()
                || model.properties.contains(&field.name)
            {
                return Err(config_error(format!(
                    "Reverse relation '{}' from '{}' clashes with a field on '{}'",
                    field.name, field.related_model, model.name
                )));
            }
            model.fields.push(Field::ReverseRelation(field));
        }
        for model in &models {
            if let Some(method) = model
                .methods
                .iter()
                .find(|m| model.get_field_or_attname(&m.name).is_some())
            {
                return Err(config_error(format!(
                    "Method '{}' on '{}' shadows a field",
                    method.name, model.name
                )));
            }
        }

        let mut validators: HashMap<String, Vec<ModelValidator>> = HashMap::new();
        for (model_name, validator) in self.validators {
            let model = index
                .get(&model_name)
                .map(|&i| &models[i])
                .ok_or_else(|| {
                    config_error(format!(
                        "Validator registered for unknown model '{model_name}'"
                    ))
                })?;
            if let Some(missing) = validator
                .fields()
                .iter()
                .find(|name| model.get_field_or_attname(name).is_none())
            {
                return Err(config_error(format!(
                    "Validator on '{model_name}' references unknown field '{missing}'"
                )));
            }
            validators.entry(model_name).or_default().push(validator);
        }

        let mut handlers = HashMap::new();
        for (model_name, method, handler) in self.handlers {
            let declared = index
                .get(&model_name)
                .is_some_and(|&i| models[i].get_method(&method).is_some());
            if !declared {
                return Err(config_error(format!(
                    "Handler registered for undeclared method '{model_name}.{method}'"
                )));
            }
            if handlers.insert((model_name, method), handler).is_some() {
                return Err(config_error(
                    "A method handler is registered twice".to_string(),
                ));
            }
        }

        tracing::debug!(models = models.len(), "Model registry built");
        Ok(ModelRegistry {
            models,
            index,
            validators,
            handlers,
        })
    }
}

fn config_error(message: String) -> ModelTypeError {
    ModelTypeError::ConfigurationError(message)
}

fn check_fields(model: &ModelDef) -> ModelTypeResult<()> {
    let mut seen = BTreeSet::new();
    for field in &model.fields {
        if matches!(field, Field::ReverseRelation(_)) {
            return Err(config_error(format!(
                "'{}.{}': reverse relations are derived from forward relations and cannot be declared",
                model.name,
                field.name()
            )));
        }
        let names = std::iter::once(field.name().to_string()).chain(field.attname());
        for name in names {
            if !seen.insert(name.clone()) {
                return Err(config_error(format!(
                    "'{}' declares '{name}' more than once",
                    model.name
                )));
            }
        }
    }
    if let Some(dup) = model.properties.iter().find(|p| seen.contains(*p)) {
        return Err(config_error(format!(
            "Property '{dup}' on '{}' shadows a field",
            model.name
        )));
    }
    for method in &model.methods {
        check_method_name(&model.name, &method.name)?;
        if !seen.insert(method.name.clone()) || model.properties.contains(&method.name) {
            return Err(config_error(format!(
                "'{}' declares '{}' more than once",
                model.name, method.name
            )));
        }
        let mut args = BTreeSet::new();
        if let Some(dup) = method.args.iter().find(|a| !args.insert(a.name.as_str())) {
            return Err(config_error(format!(
                "Method '{}.{}' declares argument '{}' more than once",
                model.name, method.name, dup.name
            )));
        }
    }
    Ok(())
}

fn ensure_primary_key(model: &mut ModelDef) -> ModelTypeResult<()> {
    match model.fields.iter().filter(|f| f.is_primary_key()).count() {
        0 => {
            if model.get_field("id").is_some() {
                return Err(config_error(format!(
                    "'{}' has a non-primary-key field named 'id' and no primary key",
                    model.name
                )));
            }
            let id = ConcreteField::new("id", FieldKind::AutoField).primary_key();
            model.fields.insert(0, Field::Concrete(id));
            Ok(())
        }
        1 => Ok(()),
        n => Err(config_error(format!(
            "'{}' declares {n} primary keys",
            model.name
        ))),
    }
}

fn reverse_relations(
    models: &[ModelDef],
    index: &HashMap<String, usize>,
) -> ModelTypeResult<Vec<(usize, ReverseRelationField)>> {
    let mut reverse = Vec::new();
    for model in models {
        for field in &model.fields {
            let Some(target) = field.related_model() else {
                continue;
            };
            let Some(&target_index) = index.get(target) else {
                return Err(config_error(format!(
                    "'{}.{}' relates to unknown model '{target}'",
                    model.name,
                    field.name()
                )));
            };
            let Field::ForwardRelation(fwd) = field else {
                continue;
            };
            let name = fwd.related_name.clone().unwrap_or_else(|| {
                let lower = model.name.to_lowercase();
                if fwd.one_to_one {
                    lower
                } else {
                    format!("{lower}_set")
                }
            });
            reverse.push((
                target_index,
                ReverseRelationField {
                    name,
                    related_model: model.name.clone(),
                    field_name: fwd.name.clone(),
                    one_to_one: fwd.one_to_one,
                },
            ));
        }
    }
    Ok(reverse)
}
