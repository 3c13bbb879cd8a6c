//! Field definitions for models.
//!
//! A [`Field`] is a closed tagged union: concrete scalar fields, forward
//! relations, reverse relations (synthesized by the
//! [`ModelRegistry`](crate::model::ModelRegistry)), and many-to-many fields.
//! Many-to-many fields are kept in the model so their names are reserved, but
//! they are excluded from every generated schema, lookup, and prefetch path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of a concrete field, determining its target type and the lookup
/// operators it supports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldKind {
    /// Auto-incrementing 32-bit integer primary key.
    AutoField,
    /// Auto-incrementing 64-bit integer primary key.
    BigAutoField,
    /// Variable-length string.
    CharField,
    /// Unlimited-length text.
    TextField,
    /// Slug (URL-friendly string).
    SlugField,
    /// Email address.
    EmailField,
    /// URL.
    UrlField,
    /// UUID.
    UuidField,
    /// 32-bit signed integer.
    IntegerField,
    /// 16-bit signed integer.
    SmallIntegerField,
    /// 64-bit signed integer.
    BigIntegerField,
    /// Non-negative integer.
    PositiveIntegerField,
    /// Non-negative 16-bit integer.
    PositiveSmallIntegerField,
    /// 64-bit floating-point number.
    FloatField,
    /// Fixed-precision decimal, carried as a string.
    DecimalField,
    /// Boolean.
    BooleanField,
    /// Boolean that also admits NULL.
    NullBooleanField,
    /// Date without time.
    DateField,
    /// Date and time.
    DateTimeField,
    /// Time without date.
    TimeField,
    /// Duration / interval.
    DurationField,
    /// Arbitrary JSON.
    JsonField,
    /// Raw binary data.
    BinaryField,
    /// Homogeneous array of another kind.
    ArrayField {
        /// The element kind.
        base: Box<FieldKind>,
    },
    /// A kind unknown to the built-in table, resolved through overrides.
    Custom {
        /// The kind's name, used as the override key.
        name: String,
    },
}

impl FieldKind {
    /// Returns the kind's name, as used for override lookups.
    pub fn name(&self) -> &str {
        match self {
            Self::AutoField => "AutoField",
            Self::BigAutoField => "BigAutoField",
            Self::CharField => "CharField",
            Self::TextField => "TextField",
            Self::SlugField => "SlugField",
            Self::EmailField => "EmailField",
            Self::UrlField => "UrlField",
            Self::UuidField => "UuidField",
            Self::IntegerField => "IntegerField",
            Self::SmallIntegerField => "SmallIntegerField",
            Self::BigIntegerField => "BigIntegerField",
            Self::PositiveIntegerField => "PositiveIntegerField",
            Self::PositiveSmallIntegerField => "PositiveSmallIntegerField",
            Self::FloatField => "FloatField",
            Self::DecimalField => "DecimalField",
            Self::BooleanField => "BooleanField",
            Self::NullBooleanField => "NullBooleanField",
            Self::DateField => "DateField",
            Self::DateTimeField => "DateTimeField",
            Self::TimeField => "TimeField",
            Self::DurationField => "DurationField",
            Self::JsonField => "JsonField",
            Self::BinaryField => "BinaryField",
            Self::ArrayField { .. } => "ArrayField",
            Self::Custom { name } => name,
        }
    }

    /// Returns `true` for string-valued kinds that support text operators.
    pub const fn is_text(&self) -> bool {
        matches!(
            self,
            Self::CharField
                | Self::TextField
                | Self::SlugField
                | Self::EmailField
                | Self::UrlField
                | Self::UuidField
        )
    }

    /// Returns `true` for numeric kinds.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::AutoField
                | Self::BigAutoField
                | Self::IntegerField
                | Self::SmallIntegerField
                | Self::BigIntegerField
                | Self::PositiveIntegerField
                | Self::PositiveSmallIntegerField
                | Self::FloatField
                | Self::DecimalField
        )
    }

    /// Returns `true` for date/time kinds that support temporal transforms.
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::DateField | Self::DateTimeField | Self::TimeField | Self::DurationField
        )
    }

    /// Returns `true` for kinds with a total order (comparison and range operators).
    pub const fn is_ordered(&self) -> bool {
        self.is_numeric() || self.is_text() || self.is_temporal()
    }

    /// Returns `true` for auto-incrementing primary-key kinds.
    pub const fn is_auto(&self) -> bool {
        matches!(self, Self::AutoField | Self::BigAutoField)
    }
}

/// One allowed value of a choice field with its display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// The stored value.
    pub value: Value,
    /// The human-readable label.
    pub label: String,
}

impl Choice {
    /// Creates a new choice.
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A scalar field stored directly on the model's row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcreteField {
    /// The field name.
    pub name: String,
    /// The field kind.
    pub kind: FieldKind,
    /// Whether NULL is allowed.
    #[serde(default)]
    pub null: bool,
    /// Whether clients may not write this field.
    #[serde(default)]
    pub read_only: bool,
    /// Whether this field is the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Allowed values, if this is a choice field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    /// Name of a custom serializer, consulted first in the type override table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serializer: Option<String>,
}

impl ConcreteField {
    /// Creates a new non-null, writable field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            null: false,
            read_only: false,
            primary_key: false,
            choices: Vec::new(),
            serializer: None,
        }
    }

    /// Allows NULL values.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Marks this field as read-only.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Marks this field as the primary key. Auto primary keys become read-only.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        if self.kind.is_auto() {
            self.read_only = true;
        }
        self
    }

    /// Sets the allowed choices.
    #[must_use]
    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    /// Sets a custom serializer name.
    #[must_use]
    pub fn serializer(mut self, name: impl Into<String>) -> Self {
        self.serializer = Some(name.into());
        self
    }
}

/// A field holding a reference to exactly one row of another model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRelationField {
    /// The relation name (the related object is exposed under this name).
    pub name: String,
    /// The related model's name.
    pub to: String,
    /// Whether this is a one-to-one relation.
    #[serde(default)]
    pub one_to_one: bool,
    /// Whether NULL is allowed.
    #[serde(default)]
    pub null: bool,
    /// Whether clients may not write this field.
    #[serde(default)]
    pub read_only: bool,
    /// Whether this relation is the primary key (one-to-one proxy models).
    #[serde(default)]
    pub primary_key: bool,
    /// The name of the reverse relation on the related model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_name: Option<String>,
}

impl ForwardRelationField {
    /// Creates a foreign key to `to`.
    pub fn foreign_key(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            to: to.into(),
            one_to_one: false,
            null: false,
            read_only: false,
            primary_key: false,
            related_name: None,
        }
    }

    /// Creates a one-to-one relation to `to`.
    pub fn one_to_one(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            one_to_one: true,
            ..Self::foreign_key(name, to)
        }
    }

    /// Allows NULL values.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Marks this field as read-only.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Marks this relation as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the reverse relation name.
    #[must_use]
    pub fn related_name(mut self, name: impl Into<String>) -> Self {
        self.related_name = Some(name.into());
        self
    }

    /// Returns the name of the stored key column, e.g. `parent_id`.
    pub fn attname(&self) -> String {
        format!("{}_id", self.name)
    }
}

/// The inverse side of a [`ForwardRelationField`], seen from the related model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseRelationField {
    /// The accessor name on this model.
    pub name: String,
    /// The model declaring the forward relation.
    pub related_model: String,
    /// The forward relation's name on `related_model`.
    pub field_name: String,
    /// Whether the forward side is one-to-one (multiplicity one).
    pub one_to_one: bool,
}

/// A many-to-many relation. Never produces schema, lookup, or prefetch output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManyToManyField {
    /// The field name.
    pub name: String,
    /// The related model's name.
    pub to: String,
}

impl ManyToManyField {
    /// Creates a new many-to-many field.
    pub fn new(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            to: to.into(),
        }
    }
}

/// A model field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum Field {
    /// A scalar field.
    Concrete(ConcreteField),
    /// A foreign key or one-to-one relation.
    ForwardRelation(ForwardRelationField),
    /// The inverse of another model's forward relation.
    ReverseRelation(ReverseRelationField),
    /// A many-to-many relation.
    ManyToMany(ManyToManyField),
}

impl Field {
    /// Returns the field name.
    pub fn name(&self) -> &str {
        match self {
            Self::Concrete(f) => &f.name,
            Self::ForwardRelation(f) => &f.name,
            Self::ReverseRelation(f) => &f.name,
            Self::ManyToMany(f) => &f.name,
        }
    }

    /// Returns `true` for any relation, including many-to-many.
    pub const fn is_relation(&self) -> bool {
        !matches!(self, Self::Concrete(_))
    }

    /// Returns `true` for many-to-many fields.
    pub const fn is_many_to_many(&self) -> bool {
        matches!(self, Self::ManyToMany(_))
    }

    /// Returns `true` if this field is the primary key.
    pub const fn is_primary_key(&self) -> bool {
        match self {
            Self::Concrete(f) => f.primary_key,
            Self::ForwardRelation(f) => f.primary_key,
            Self::ReverseRelation(_) | Self::ManyToMany(_) => false,
        }
    }

    /// Returns whether the field admits NULL. Reverse relations are always
    /// optional from the client's point of view.
    pub const fn is_nullable(&self) -> bool {
        match self {
            Self::Concrete(f) => f.null,
            Self::ForwardRelation(f) => f.null,
            Self::ReverseRelation(_) | Self::ManyToMany(_) => true,
        }
    }

    /// Returns whether the field is read-only for clients.
    pub const fn is_read_only(&self) -> bool {
        match self {
            Self::Concrete(f) => f.read_only,
            Self::ForwardRelation(f) => f.read_only,
            Self::ReverseRelation(_) | Self::ManyToMany(_) => true,
        }
    }

    /// Returns the related model for relation fields.
    pub fn related_model(&self) -> Option<&str> {
        match self {
            Self::Concrete(_) => None,
            Self::ForwardRelation(f) => Some(&f.to),
            Self::ReverseRelation(f) => Some(&f.related_model),
            Self::ManyToMany(f) => Some(&f.to),
        }
    }

    /// Returns the stored key name for forward relations.
    pub fn attname(&self) -> Option<String> {
        match self {
            Self::ForwardRelation(f) => Some(f.attname()),
            _ => None,
        }
    }
}

impl From<ConcreteField> for Field {
    fn from(field: ConcreteField) -> Self {
        Self::Concrete(field)
    }
}

impl From<ForwardRelationField> for Field {
    fn from(field: ForwardRelationField) -> Self {
        Self::ForwardRelation(field)
    }
}

impl From<ManyToManyField> for Field {
    fn from(field: ManyToManyField) -> Self {
        Self::ManyToMany(field)
    }
}
