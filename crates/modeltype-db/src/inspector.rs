//! Field classification for a single model.
//!
//! [`ModelInspector`] buckets every field of a [`ModelDef`] into exactly one of
//! concrete, forward-relation, reverse-relation, or many-to-many. The buckets
//! are computed by an exhaustive match over [`Field`], so adding a variant is a
//! compile error here rather than a silent fallthrough.

use modeltype_core::{ModelTypeError, ModelTypeResult};

use crate::fields::{ConcreteField, Field, ForwardRelationField, ManyToManyField, ReverseRelationField};
use crate::model::ModelDef;

/// A read-only, classified view over one model's fields.
#[derive(Debug, Clone)]
pub struct ModelInspector<'a> {
    model: &'a ModelDef,
    concrete: Vec<&'a ConcreteField>,
    forward: Vec<&'a ForwardRelationField>,
    reverse: Vec<&'a ReverseRelationField>,
    many_to_many: Vec<&'a ManyToManyField>,
}

impl<'a> ModelInspector<'a> {
    /// Classifies the fields of `model`.
    pub fn new(model: &'a ModelDef) -> Self {
        let mut inspector = Self {
            model,
            concrete: Vec::new(),
            forward: Vec::new(),
            reverse: Vec::new(),
            many_to_many: Vec::new(),
        };
        for field in &model.fields {
            match field {
                Field::Concrete(f) => inspector.concrete.push(f),
                Field::ForwardRelation(f) => inspector.forward.push(f),
                Field::ReverseRelation(f) => inspector.reverse.push(f),
                Field::ManyToMany(f) => inspector.many_to_many.push(f),
            }
        }
        inspector
    }

    /// Returns the inspected model.
    pub const fn model(&self) -> &'a ModelDef {
        self.model
    }

    /// Returns the primary-key field.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` if the model declares no primary key,
    /// which cannot happen for models obtained from a registry.
    pub fn pk_field(&self) -> ModelTypeResult<&'a Field> {
        self.model
            .fields
            .iter()
            .find(|f| f.is_primary_key())
            .ok_or_else(|| {
                ModelTypeError::ImproperlyConfigured(format!(
                    "Model '{}' has no primary key",
                    self.model.name
                ))
            })
    }

    /// Returns the primary key's name.
    pub fn pk_name(&self) -> ModelTypeResult<&'a str> {
        self.pk_field().map(Field::name)
    }

    /// Concrete (non-relation) fields, in declaration order.
    pub fn concrete_fields(&self) -> &[&'a ConcreteField] {
        &self.concrete
    }

    /// Forward relation fields (foreign keys and one-to-one), in declaration order.
    pub fn forward_relations(&self) -> &[&'a ForwardRelationField] {
        &self.forward
    }

    /// Reverse relation fields, in registration order.
    pub fn reverse_relations(&self) -> &[&'a ReverseRelationField] {
        &self.reverse
    }

    /// Reverse relations whose forward side is one-to-one.
    pub fn reverse_one_to_one(&self) -> impl Iterator<Item = &'a ReverseRelationField> + '_ {
        self.reverse.iter().copied().filter(|r| r.one_to_one)
    }

    /// Many-to-many fields, which are excluded from all generated output.
    pub fn many_to_many(&self) -> &[&'a ManyToManyField] {
        &self.many_to_many
    }

    /// Returns the field named `name`, or whose attname is `name`.
    pub fn field(&self, name: &str) -> Option<&'a Field> {
        self.model.get_field_or_attname(name)
    }

    /// Returns the names a serializer exposes by default: concrete field names
    /// and forward relation attnames, in declaration order.
    pub fn serializable_names(&self) -> Vec<String> {
        self.model
            .fields
            .iter()
            .filter_map(|f| match f {
                Field::Concrete(c) => Some(c.name.clone()),
                Field::ForwardRelation(r) => Some(r.attname()),
                Field::ReverseRelation(_) | Field::ManyToMany(_) => None,
            })
            .collect()
    }
}
