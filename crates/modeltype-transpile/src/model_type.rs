//! Per-model generated units.
//!
//! [`ModelTypeTranspiler`] turns one model of a pool into a
//! [`ModelTypeUnit`]: the field interface, the model interface with relation
//! members, the flattened lookups, the prefetch-key union, the field
//! schema, and the signatures of declared methods. Relations pointing outside the pool contribute only their
//! attname with the related primary key's scalar type.

use modeltype_core::{ModelTypeError, ModelTypeResult};
use modeltype_db::{
    Choice, ConcreteField, Field, ForwardRelationField, LookupType, MethodDef, ModelDef,
    ModelInspector, ModelPool, ReverseRelationField,
};
use serde::Serialize;

use crate::field_type::{FieldTypeMap, ANY, NEVER};
use crate::literal;
use crate::lookup::LookupResolver;

pub const FIELDS_SUFFIX: &str = "Fields";
pub const QUERYSET_SUFFIX: &str = "QuerySet";
pub const LOOKUPS_SUFFIX: &str = "QuerySetLookups";
pub const PREFETCH_KEY_SUFFIX: &str = "PrefetchKey";
pub const FIELDS_SCHEMA_SUFFIX: &str = "FieldsSchema";

/// Generated type names for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitNames {
    pub model: String,
    pub fields: String,
    pub lookups: String,
    pub queryset: String,
    pub prefetch_key: String,
    pub fields_schema: String,
}

impl UnitNames {
    /// Derives every generated name from the model name.
    pub fn for_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            fields: format!("{model}{FIELDS_SUFFIX}"),
            lookups: format!("{model}{LOOKUPS_SUFFIX}"),
            queryset: format!("{model}{QUERYSET_SUFFIX}"),
            prefetch_key: format!("{model}{PREFETCH_KEY_SUFFIX}"),
            fields_schema: format!("{model}{FIELDS_SCHEMA_SUFFIX}"),
        }
    }
}

/// A `readonly name?: type` member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDeclaration {
    pub name: String,
    pub optional: bool,
    pub readonly: bool,
    #[serde(rename = "type")]
    pub ts_type: String,
}

impl TypeDeclaration {
    pub fn new(name: impl Into<String>, ts_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            readonly: false,
            ts_type: ts_type.into(),
        }
    }

    #[must_use]
    pub const fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub const fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Renders the member without a trailing separator.
    pub fn render(&self) -> String {
        format!(
            "{}{}{}: {}",
            if self.readonly { "readonly " } else { "" },
            literal::property_key(&self.name),
            if self.optional { "?" } else { "" },
            self.ts_type
        )
    }
}

/// One entry of the field schema table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub field_name: String,
    pub field_type: String,
    pub nullable: bool,
    pub is_read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_model: Option<String>,
}

/// A filterable accessor for a reverse relation to a model in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseRelationAccessor {
    /// The accessor name, e.g. `children`.
    pub name: String,
    /// The related model's queryset type.
    pub queryset_name: String,
    /// The related model's lookups type.
    pub lookups_type: String,
    /// The forward field on the related model that points back here.
    pub lookup_key: String,
}

/// A callable declared on the model. Static methods land on the queryset
/// interface, instance methods on the model interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSignature {
    pub name: String,
    /// Members of the argument object; nullable arguments are optional.
    pub args: Vec<TypeDeclaration>,
    pub is_static: bool,
}

impl MethodSignature {
    /// Renders the member without a trailing separator.
    pub fn render(&self) -> String {
        let params = if self.args.is_empty() {
            String::new()
        } else {
            let members: Vec<String> = self.args.iter().map(TypeDeclaration::render).collect();
            format!("args: {{{}}}", members.join(", "))
        };
        format!("{}({params}): Promise<{ANY}>", literal::property_key(&self.name))
    }
}

/// Everything generated for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTypeUnit {
    pub names: UnitNames,
    pub pk_field: String,
    pub pk_type: String,
    /// Members of `<Model>Fields`.
    pub interface: Vec<TypeDeclaration>,
    /// Relation object members of `<Model>`.
    pub relations: Vec<TypeDeclaration>,
    /// Members of `<Model>QuerySetLookups`, all optional.
    pub lookups: Vec<TypeDeclaration>,
    /// Parts of the `<Model>PrefetchKey` union; empty means `never`.
    pub prefetch_keys: Vec<String>,
    /// Field schema entries keyed by exposed name, in declaration order.
    pub schema: Vec<FieldSchema>,
    pub reverse_relations: Vec<ReverseRelationAccessor>,
    pub methods: Vec<MethodSignature>,
}

impl ModelTypeUnit {
    /// Returns the prefetch-key union body.
    pub fn prefetch_type(&self) -> String {
        if self.prefetch_keys.is_empty() {
            NEVER.to_string()
        } else {
            self.prefetch_keys.join(" |\n  ")
        }
    }
}

/// Builds [`ModelTypeUnit`]s for models of one pool.
#[derive(Debug, Clone, Copy)]
pub struct ModelTypeTranspiler<'p, 'a> {
    pool: &'p ModelPool<'a>,
    types: &'p FieldTypeMap,
}

impl<'p, 'a> ModelTypeTranspiler<'p, 'a> {
    pub const fn new(pool: &'p ModelPool<'a>, types: &'p FieldTypeMap) -> Self {
        Self { pool, types }
    }

    /// Builds the unit for `model`.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` when the model or a related model has
    /// no resolvable primary key.
    pub fn transpile(&self, model: &ModelDef) -> ModelTypeResult<ModelTypeUnit> {
        let inspector = ModelInspector::new(model);
        let pk = inspector.pk_field()?;
        let pk_type = self.exposed_type(pk)?;
        let pk_field = pk.attname().unwrap_or_else(|| pk.name().to_string());

        let mut unit = ModelTypeUnit {
            names: UnitNames::for_model(&model.name),
            pk_field,
            pk_type,
            interface: Vec::new(),
            relations: Vec::new(),
            lookups: Vec::new(),
            prefetch_keys: Vec::new(),
            schema: Vec::new(),
            reverse_relations: Vec::new(),
            methods: Vec::new(),
        };

        for field in &model.fields {
            match field {
                Field::Concrete(f) => self.concrete(&mut unit, field, f),
                Field::ForwardRelation(f) => self.forward(&mut unit, field, f)?,
                Field::ReverseRelation(f) => self.reverse(&mut unit, field, f),
                Field::ManyToMany(f) => {
                    tracing::trace!(model = %model.name, field = %f.name, "Skipping many-to-many field");
                }
            }
        }

        for property in &model.properties {
            unit.interface.push(
                TypeDeclaration::new(property.as_str(), ANY)
                    .optional(true)
                    .readonly(true),
            );
            unit.prefetch_keys.push(literal::quote(property));
        }

        unit.methods = model.methods.iter().map(|m| self.method(m)).collect();

        tracing::debug!(
            model = %model.name,
            lookups = unit.lookups.len(),
            prefetch = unit.prefetch_keys.len(),
            "Built model type unit"
        );
        Ok(unit)
    }

    fn resolver(&self) -> LookupResolver<'p, 'a> {
        LookupResolver::new(self.pool)
    }

    /// The type of a field as exposed on a serialized row.
    fn exposed_type(&self, field: &Field) -> ModelTypeResult<String> {
        match field {
            Field::Concrete(f) => Ok(self.concrete_type(f)),
            Field::ForwardRelation(f) => {
                let kind = self.pool.registry().pk_kind(&f.to)?;
                Ok(self.types.resolve(&kind, None))
            }
            Field::ReverseRelation(_) | Field::ManyToMany(_) => Err(ModelTypeError::TranspileError(
                format!("Field '{}' has no scalar representation", field.name()),
            )),
        }
    }

    fn concrete_type(&self, field: &ConcreteField) -> String {
        if field.choices.is_empty() {
            return self.types.resolve_field(field, None);
        }
        let literals: Vec<String> = field
            .choices
            .iter()
            .map(|c| literal::transpile(&c.value))
            .collect();
        literals.join(" | ")
    }

    fn method(&self, method: &MethodDef) -> MethodSignature {
        MethodSignature {
            name: method.name.clone(),
            args: method
                .args
                .iter()
                .map(|arg| {
                    TypeDeclaration::new(arg.name.as_str(), self.concrete_type(arg))
                        .optional(arg.null)
                })
                .collect(),
            is_static: method.is_static,
        }
    }

    fn concrete(&self, unit: &mut ModelTypeUnit, declared: &Field, field: &ConcreteField) {
        let ts_type = self.concrete_type(field);
        unit.interface.push(
            TypeDeclaration::new(field.name.as_str(), ts_type.as_str())
                .optional(field.null)
                .readonly(field.read_only),
        );

        for spec in self.resolver().lookup_info(declared) {
            let lookup_type = match spec.operator {
                None => ts_type.clone(),
                // Choice literals survive the transforms that keep values intact.
                Some(op) if !field.choices.is_empty() && is_value_preserving(op) => {
                    FieldTypeMap::transform(ts_type.clone(), &field.kind, op)
                }
                Some(op) => self.types.resolve_field(field, Some(op)),
            };
            unit.lookups
                .push(TypeDeclaration::new(spec.key, lookup_type).optional(true));
        }

        unit.schema.push(FieldSchema {
            field_name: field.name.clone(),
            field_type: field.kind.name().to_string(),
            nullable: field.null,
            is_read_only: field.read_only,
            choices: (!field.choices.is_empty()).then(|| field.choices.clone()),
            related_model: None,
        });
    }

    fn forward(
        &self,
        unit: &mut ModelTypeUnit,
        field: &Field,
        relation: &ForwardRelationField,
    ) -> ModelTypeResult<()> {
        let attname = relation.attname();
        let pk_type = self.exposed_type(field)?;
        unit.interface.push(
            TypeDeclaration::new(attname.as_str(), pk_type.as_str())
                .optional(relation.null)
                .readonly(relation.read_only),
        );

        let specs = self.resolver().lookup_info(field);
        if specs.is_empty() {
            return Ok(());
        }
        let related = UnitNames::for_model(&relation.to);
        unit.lookups
            .push(TypeDeclaration::new(attname.as_str(), pk_type).optional(true));
        for spec in specs {
            unit.lookups
                .push(TypeDeclaration::new(spec.key, related.lookups.as_str()).optional(true));
        }
        unit.relations.push(
            TypeDeclaration::new(relation.name.as_str(), relation.to.as_str()).optional(true),
        );
        unit.prefetch_keys
            .push(relation_prefetch_key(&relation.name, &related.prefetch_key));
        unit.schema.push(FieldSchema {
            field_name: attname,
            field_type: if relation.one_to_one { "OneToOneField" } else { "ForeignKey" }.to_string(),
            nullable: relation.null,
            is_read_only: relation.read_only,
            choices: None,
            related_model: Some(relation.to.clone()),
        });
        Ok(())
    }

    fn reverse(&self, unit: &mut ModelTypeUnit, field: &Field, relation: &ReverseRelationField) {
        let specs = self.resolver().lookup_info(field);
        if specs.is_empty() {
            return;
        }
        let related = UnitNames::for_model(&relation.related_model);
        for spec in specs {
            unit.lookups
                .push(TypeDeclaration::new(spec.key, related.lookups.as_str()).optional(true));
        }
        if relation.one_to_one {
            unit.relations.push(
                TypeDeclaration::new(relation.name.as_str(), relation.related_model.as_str())
                    .optional(true),
            );
            unit.prefetch_keys
                .push(relation_prefetch_key(&relation.name, &related.prefetch_key));
        } else {
            unit.reverse_relations.push(ReverseRelationAccessor {
                name: relation.name.clone(),
                queryset_name: related.queryset,
                lookups_type: related.lookups,
                lookup_key: relation.field_name.clone(),
            });
        }
    }
}

const fn is_value_preserving(op: LookupType) -> bool {
    matches!(op, LookupType::Exact | LookupType::In | LookupType::Range)
}

fn relation_prefetch_key(name: &str, related_prefetch_key: &str) -> String {
    format!("{} | {{{}: {related_prefetch_key}}}", literal::quote(name), literal::property_key(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use modeltype_db::{FieldKind, ManyToManyField, ModelRegistry};

    fn registry() -> ModelRegistry {
        ModelRegistry::builder()
            .register(
                ModelDef::new("Thing")
                    .field(
                        ConcreteField::new("status", FieldKind::CharField)
                            .choices(vec![Choice::new("draft", "Draft"), Choice::new("live", "Live")]),
                    )
                    .field(ConcreteField::new("number", FieldKind::IntegerField).nullable())
                    .field(ManyToManyField::new("tags", "Tag"))
                    .property("label"),
            )
            .register(ModelDef::new("Tag"))
            .register(
                ModelDef::new("ThingChild")
                    .field(
                        ForwardRelationField::foreign_key("parent", "Thing")
                            .nullable()
                            .related_name("children"),
                    ),
            )
            .register(
                ModelDef::new("ThingOneToOneTarget").field(
                    ForwardRelationField::one_to_one("sibling_thing", "Thing")
                        .related_name("one_to_one_target"),
                ),
            )
            .build()
            .unwrap()
    }

    fn unit(registry: &ModelRegistry, pool: &ModelPool<'_>, model: &str) -> ModelTypeUnit {
        let types = FieldTypeMap::new();
        ModelTypeTranspiler::new(pool, &types)
            .transpile(registry.get(model).unwrap())
            .unwrap()
    }

    fn find<'u>(decls: &'u [TypeDeclaration], name: &str) -> Option<&'u TypeDeclaration> {
        decls.iter().find(|d| d.name == name)
    }

    #[test]
    fn test_names() {
        let names = UnitNames::for_model("Thing");
        assert_eq!(names.fields, "ThingFields");
        assert_eq!(names.lookups, "ThingQuerySetLookups");
        assert_eq!(names.queryset, "ThingQuerySet");
        assert_eq!(names.prefetch_key, "ThingPrefetchKey");
        assert_eq!(names.fields_schema, "ThingFieldsSchema");
    }

    #[test]
    fn test_declaration_render() {
        let decl = TypeDeclaration::new("id", "number").readonly(true);
        assert_eq!(decl.render(), "readonly id: number");
        let decl = TypeDeclaration::new("name", "string").optional(true);
        assert_eq!(decl.render(), "name?: string");
    }

    #[test]
    fn test_interface_and_choices() {
        let registry = registry();
        let pool = registry.full_pool();
        let unit = unit(&registry, &pool, "Thing");
        assert_eq!(unit.pk_field, "id");
        assert_eq!(unit.pk_type, "number");

        let id = find(&unit.interface, "id").unwrap();
        assert!(id.readonly);
        assert_eq!(find(&unit.interface, "status").unwrap().ts_type, "'draft' | 'live'");
        assert!(find(&unit.interface, "number").unwrap().optional);
        let label = find(&unit.interface, "label").unwrap();
        assert_eq!(label.render(), "readonly label?: any");

        assert_eq!(
            find(&unit.lookups, "status__in").unwrap().ts_type,
            "('draft' | 'live')[]"
        );
        assert_eq!(find(&unit.lookups, "status__icontains").unwrap().ts_type, "string");
        assert_eq!(find(&unit.lookups, "number__isnull").unwrap().ts_type, "boolean");
        assert!(unit.lookups.iter().all(|l| l.optional));

        let status = unit.schema.iter().find(|s| s.field_name == "status").unwrap();
        assert_eq!(status.choices.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_many_to_many_is_absent() {
        let registry = registry();
        let pool = registry.full_pool();
        let unit = unit(&registry, &pool, "Thing");
        let json = serde_json::to_string(&unit).unwrap();
        assert!(!json.contains("tags"));
    }

    #[test]
    fn test_forward_relation_in_pool() {
        let registry = registry();
        let pool = registry.full_pool();
        let unit = unit(&registry, &pool, "ThingChild");
        assert_eq!(find(&unit.interface, "parent_id").unwrap().render(), "parent_id?: number");
        assert_eq!(find(&unit.lookups, "parent_id").unwrap().ts_type, "number");
        assert_eq!(find(&unit.lookups, "parent").unwrap().ts_type, "ThingQuerySetLookups");
        assert_eq!(find(&unit.relations, "parent").unwrap().ts_type, "Thing");
        assert_eq!(unit.prefetch_keys, vec!["'parent' | {parent: ThingPrefetchKey}"]);
        let schema = unit.schema.iter().find(|s| s.field_name == "parent_id").unwrap();
        assert_eq!(schema.related_model.as_deref(), Some("Thing"));
        assert_eq!(schema.field_type, "ForeignKey");
    }

    #[test]
    fn test_reverse_relations() {
        let registry = registry();
        let pool = registry.full_pool();
        let unit = unit(&registry, &pool, "Thing");
        assert_eq!(
            unit.reverse_relations,
            vec![ReverseRelationAccessor {
                name: "children".to_string(),
                queryset_name: "ThingChildQuerySet".to_string(),
                lookups_type: "ThingChildQuerySetLookups".to_string(),
                lookup_key: "parent".to_string(),
            }]
        );
        assert_eq!(
            find(&unit.lookups, "one_to_one_target").unwrap().ts_type,
            "ThingOneToOneTargetQuerySetLookups"
        );
        assert_eq!(
            find(&unit.relations, "one_to_one_target").unwrap().ts_type,
            "ThingOneToOneTarget"
        );
        assert_eq!(
            unit.prefetch_type(),
            "'one_to_one_target' | {one_to_one_target: ThingOneToOneTargetPrefetchKey} |\n  'label'"
        );
    }

    #[test]
    fn test_relation_outside_pool() {
        let registry = registry();
        let pool = registry.pool(&["ThingChild"]).unwrap();
        let unit = unit(&registry, &pool, "ThingChild");
        assert_eq!(find(&unit.interface, "parent_id").unwrap().ts_type, "number");
        assert!(find(&unit.lookups, "parent").is_none());
        assert!(find(&unit.lookups, "parent_id").is_none());
        assert!(unit.relations.is_empty());
        assert_eq!(unit.prefetch_type(), "never");
        assert!(unit.schema.iter().all(|s| s.related_model.is_none()));
    }

    #[test]
    fn test_method_signatures() {
        let registry = ModelRegistry::builder()
            .register(
                ModelDef::new("Thing")
                    .field(ConcreteField::new("name", FieldKind::CharField))
                    .method(
                        MethodDef::instance("rename")
                            .arg(ConcreteField::new("to", FieldKind::CharField))
                            .arg(
                                ConcreteField::new("mode", FieldKind::CharField)
                                    .nullable()
                                    .choices(vec![Choice::new("soft", "Soft")]),
                            ),
                    )
                    .method(MethodDef::static_method("archive-all")),
            )
            .build()
            .unwrap();
        let pool = registry.full_pool();
        let unit = unit(&registry, &pool, "Thing");
        assert_eq!(unit.methods.len(), 2);
        assert!(!unit.methods[0].is_static);
        assert_eq!(
            unit.methods[0].render(),
            "rename(args: {to: string, mode?: 'soft'}): Promise<any>"
        );
        assert!(unit.methods[1].is_static);
        assert_eq!(unit.methods[1].render(), "'archive-all'(): Promise<any>");

        let json = serde_json::to_value(&unit.methods[1]).unwrap();
        assert_eq!(json, serde_json::json!({"name": "archive-all", "args": [], "isStatic": true}));
    }

    #[test]
    fn test_one_to_one_primary_key_chain() {
        let registry = ModelRegistry::builder()
            .register(
                ModelDef::new("Place")
                    .field(ConcreteField::new("code", FieldKind::CharField).primary_key()),
            )
            .register(
                ModelDef::new("Restaurant")
                    .field(ForwardRelationField::one_to_one("place", "Place").primary_key()),
            )
            .register(
                ModelDef::new("Kitchen")
                    .field(ForwardRelationField::foreign_key("restaurant", "Restaurant")),
            )
            .build()
            .unwrap();
        let pool = registry.full_pool();
        let restaurant = unit(&registry, &pool, "Restaurant");
        assert_eq!(restaurant.pk_field, "place_id");
        assert_eq!(restaurant.pk_type, "string");
        let kitchen = unit(&registry, &pool, "Kitchen");
        assert_eq!(find(&kitchen.interface, "restaurant_id").unwrap().ts_type, "string");
    }
}
