//! Field kind to TypeScript type resolution.
//!
//! Resolution checks the user override table first (by serializer name,
//! then by kind name), then the built-in table. A lookup operator that is a
//! container transform wraps the root type afterwards:
//!
//! | operator | type           |
//! |----------|----------------|
//! | `in`     | `T[]`          |
//! | `range`  | `[T, T]`       |
//! | `isnull` | `boolean`      |
//!
//! Unknown kinds resolve to `any`; resolution never fails.

use std::collections::HashMap;

use modeltype_core::Settings;
use modeltype_db::{ConcreteField, FieldKind, LookupType};

pub const ANY: &str = "any";
pub const NUMBER: &str = "number";
pub const STRING: &str = "string";
pub const BOOLEAN: &str = "boolean";
pub const OBJECT: &str = "object";
pub const NULL: &str = "null";
pub const NEVER: &str = "never";

/// Maps field kinds to TypeScript types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTypeMap {
    overrides: HashMap<String, String>,
}

impl FieldTypeMap {
    /// Creates a map with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map with the given overrides, keyed by kind or serializer name.
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Creates a map using the `field_types` override table of `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_overrides(settings.field_types.clone())
    }

    /// Resolves `kind`, optionally through `lookup`.
    pub fn resolve(&self, kind: &FieldKind, lookup: Option<LookupType>) -> String {
        self.resolve_with(kind, None, lookup)
    }

    /// Resolves a concrete field's kind, honoring its serializer override.
    pub fn resolve_field(&self, field: &ConcreteField, lookup: Option<LookupType>) -> String {
        self.resolve_with(&field.kind, field.serializer.as_deref(), lookup)
    }

    /// Resolves `kind` with an optional serializer name consulted first.
    pub fn resolve_with(
        &self,
        kind: &FieldKind,
        serializer: Option<&str>,
        lookup: Option<LookupType>,
    ) -> String {
        let root = self.root_type(kind, serializer);
        match lookup {
            Some(op) => Self::transform(root, kind, op),
            None => root,
        }
    }

    fn root_type(&self, kind: &FieldKind, serializer: Option<&str>) -> String {
        if let Some(ts) = serializer.and_then(|s| self.overrides.get(s)) {
            return ts.clone();
        }
        if let Some(ts) = self.overrides.get(kind.name()) {
            return ts.clone();
        }
        self.builtin(kind)
    }

    fn builtin(&self, kind: &FieldKind) -> String {
        match kind {
            FieldKind::AutoField
            | FieldKind::BigAutoField
            | FieldKind::IntegerField
            | FieldKind::SmallIntegerField
            | FieldKind::BigIntegerField
            | FieldKind::PositiveIntegerField
            | FieldKind::PositiveSmallIntegerField
            | FieldKind::FloatField
            | FieldKind::DecimalField => NUMBER.to_string(),
            FieldKind::CharField
            | FieldKind::TextField
            | FieldKind::SlugField
            | FieldKind::EmailField
            | FieldKind::UrlField
            | FieldKind::UuidField
            // Dates and times travel as ISO strings.
            | FieldKind::DateField
            | FieldKind::DateTimeField
            | FieldKind::TimeField
            | FieldKind::DurationField => STRING.to_string(),
            FieldKind::BooleanField => BOOLEAN.to_string(),
            FieldKind::NullBooleanField => format!("{BOOLEAN} | {NULL}"),
            FieldKind::JsonField => OBJECT.to_string(),
            FieldKind::ArrayField { base } => {
                let element = self.root_type(base, None);
                format!("{}[]", parenthesize(&element))
            }
            FieldKind::BinaryField | FieldKind::Custom { .. } => ANY.to_string(),
        }
    }

    /// Applies a lookup operator's container transform to `root`.
    pub fn transform(root: String, kind: &FieldKind, op: LookupType) -> String {
        match op {
            LookupType::In => format!("{}[]", parenthesize(&root)),
            LookupType::Range => format!("[{root}, {root}]"),
            LookupType::IsNull => BOOLEAN.to_string(),
            LookupType::Year
            | LookupType::Month
            | LookupType::Day
            | LookupType::WeekDay
            | LookupType::Hour
            | LookupType::Minute
            | LookupType::Second => NUMBER.to_string(),
            LookupType::Date => STRING.to_string(),
            _ if op.is_text() && !kind.is_text() => STRING.to_string(),
            _ => root,
        }
    }
}

/// Wraps union types in parentheses so a suffix applies to the whole union.
pub fn parenthesize(ts: &str) -> String {
    if ts.contains(" | ") {
        format!("({ts})")
    } else {
        ts.to_string()
    }
}
