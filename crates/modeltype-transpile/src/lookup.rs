//! Lookup keys generated for each field.
//!
//! The operators a field supports depend only on its kind and nullability.
//! Relation fields never expand into the related model's keys here: they
//! yield a single entry naming the related model, which the generated unit
//! turns into a named reference to that model's lookups type.

use modeltype_db::lookups::LOOKUP_SEP;
use modeltype_db::{Field, FieldKind, LookupType, ModelPool};

/// One generated lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSpec {
    /// The compound key, e.g. `number__gte`.
    pub key: String,
    /// The name of the field the key filters on.
    pub field: String,
    /// The operator, or `None` for the bare field key.
    pub operator: Option<LookupType>,
    /// The related model, for relation keys.
    pub related_model: Option<String>,
}

const TEXT_OPERATORS: [LookupType; 9] = [
    LookupType::IExact,
    LookupType::Contains,
    LookupType::IContains,
    LookupType::StartsWith,
    LookupType::IStartsWith,
    LookupType::EndsWith,
    LookupType::IEndsWith,
    LookupType::Regex,
    LookupType::IRegex,
];

const ORDER_OPERATORS: [LookupType; 5] = [
    LookupType::Gt,
    LookupType::Gte,
    LookupType::Lt,
    LookupType::Lte,
    LookupType::Range,
];

/// Returns the operators supported by a field of `kind`, in a stable order.
pub fn operators_for(kind: &FieldKind, nullable: bool) -> Vec<LookupType> {
    let mut ops = vec![LookupType::Exact];
    let scalar = !matches!(
        kind,
        FieldKind::JsonField | FieldKind::BinaryField | FieldKind::ArrayField { .. }
    );
    if scalar {
        ops.push(LookupType::In);
    }
    if kind.is_text() {
        ops.extend(TEXT_OPERATORS);
    }
    if kind.is_ordered() {
        ops.extend(ORDER_OPERATORS);
    }
    match kind {
        FieldKind::DateField => ops.extend([
            LookupType::Year,
            LookupType::Month,
            LookupType::Day,
            LookupType::WeekDay,
        ]),
        FieldKind::DateTimeField => ops.extend([
            LookupType::Date,
            LookupType::Year,
            LookupType::Month,
            LookupType::Day,
            LookupType::WeekDay,
            LookupType::Hour,
            LookupType::Minute,
            LookupType::Second,
        ]),
        FieldKind::TimeField => {
            ops.extend([LookupType::Hour, LookupType::Minute, LookupType::Second]);
        }
        _ => {}
    }
    if nullable {
        ops.push(LookupType::IsNull);
    }
    ops
}

/// Computes lookup keys for fields of models in a pool.
#[derive(Debug, Clone, Copy)]
pub struct LookupResolver<'p, 'a> {
    pool: &'p ModelPool<'a>,
}

impl<'p, 'a> LookupResolver<'p, 'a> {
    /// Creates a resolver for `pool`.
    pub const fn new(pool: &'p ModelPool<'a>) -> Self {
        Self { pool }
    }

    /// Returns the lookup keys for `field`.
    ///
    /// Many-to-many fields and relations to models outside the pool yield
    /// nothing.
    pub fn lookup_info(&self, field: &Field) -> Vec<LookupSpec> {
        match field {
            Field::Concrete(f) => {
                let mut specs = vec![LookupSpec {
                    key: f.name.clone(),
                    field: f.name.clone(),
                    operator: None,
                    related_model: None,
                }];
                specs.extend(operators_for(&f.kind, f.null).into_iter().map(|op| LookupSpec {
                    key: format!("{}{LOOKUP_SEP}{op}", f.name),
                    field: f.name.clone(),
                    operator: Some(op),
                    related_model: None,
                }));
                specs
            }
            Field::ForwardRelation(_) | Field::ReverseRelation(_) => {
                let Some(related) = field.related_model() else {
                    return Vec::new();
                };
                if !self.pool.contains(related) {
                    tracing::trace!(field = field.name(), related, "Relation target outside pool");
                    return Vec::new();
                }
                vec![LookupSpec {
                    key: field.name().to_string(),
                    field: field.name().to_string(),
                    operator: None,
                    related_model: Some(related.to_string()),
                }]
            }
            Field::ManyToMany(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modeltype_db::{ConcreteField, ForwardRelationField, ManyToManyField, ModelDef, ModelRegistry};

    fn registry() -> ModelRegistry {
        ModelRegistry::builder()
            .register(
                ModelDef::new("Thing")
                    .field(ConcreteField::new("name", FieldKind::CharField))
                    .field(ConcreteField::new("number", FieldKind::IntegerField).nullable())
                    .field(ConcreteField::new("data", FieldKind::JsonField))
                    .field(ManyToManyField::new("tags", "Tag")),
            )
            .register(ModelDef::new("Tag"))
            .register(
                ModelDef::new("ThingChild")
                    .field(ForwardRelationField::foreign_key("parent", "Thing").related_name("children")),
            )
            .build()
            .unwrap()
    }

    fn keys(specs: &[LookupSpec]) -> Vec<&str> {
        specs.iter().map(|s| s.key.as_str()).collect()
    }

    #[test]
    fn test_operator_table() {
        let text = operators_for(&FieldKind::CharField, false);
        assert!(text.contains(&LookupType::IStartsWith));
        assert!(!text.contains(&LookupType::IsNull));

        let number = operators_for(&FieldKind::IntegerField, true);
        assert!(number.contains(&LookupType::Range));
        assert!(number.contains(&LookupType::IsNull));
        assert!(!number.contains(&LookupType::Contains));

        let date = operators_for(&FieldKind::DateField, false);
        assert!(date.contains(&LookupType::Year));
        assert!(!date.contains(&LookupType::Hour));

        assert_eq!(operators_for(&FieldKind::JsonField, false), vec![LookupType::Exact]);
        assert_eq!(
            operators_for(&FieldKind::BooleanField, false),
            vec![LookupType::Exact, LookupType::In]
        );
    }

    #[test]
    fn test_concrete_lookups() {
        let registry = registry();
        let pool = registry.full_pool();
        let resolver = LookupResolver::new(&pool);
        let thing = registry.get("Thing").unwrap();
        let specs = resolver.lookup_info(thing.get_field("number").unwrap());
        assert_eq!(specs[0].key, "number");
        assert_eq!(specs[0].operator, None);
        let keys = keys(&specs);
        assert!(keys.contains(&"number__in"));
        assert!(keys.contains(&"number__isnull"));
        assert!(!keys.contains(&"number__startswith"));
    }

    #[test]
    fn test_many_to_many_yields_nothing() {
        let registry = registry();
        let pool = registry.full_pool();
        let thing = registry.get("Thing").unwrap();
        assert!(LookupResolver::new(&pool)
            .lookup_info(thing.get_field("tags").unwrap())
            .is_empty());
    }

    #[test]
    fn test_relation_in_and_out_of_pool() {
        let registry = registry();
        let child = registry.get("ThingChild").unwrap();
        let parent = child.get_field("parent").unwrap();

        let pool = registry.full_pool();
        let specs = LookupResolver::new(&pool).lookup_info(parent);
        assert_eq!(
            specs,
            vec![LookupSpec {
                key: "parent".to_string(),
                field: "parent".to_string(),
                operator: None,
                related_model: Some("Thing".to_string()),
            }]
        );

        let pool = registry.pool(&["ThingChild"]).unwrap();
        assert!(LookupResolver::new(&pool).lookup_info(parent).is_empty());

        let thing = registry.get("Thing").unwrap();
        let reverse = thing.get_field("children").unwrap();
        let pool = registry.full_pool();
        assert_eq!(keys(&LookupResolver::new(&pool).lookup_info(reverse)), vec!["children"]);
    }
}
