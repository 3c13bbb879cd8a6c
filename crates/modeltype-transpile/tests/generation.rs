//! Integration tests for schema generation runs.
//!
//! Tests cover:
//! 1. Many-to-many fields are absent from every generated surface
//! 2. Relations to models outside the pool keep only their attname
//! 3. Cyclic relation graphs generate named lookup references
//! 4. Failing runs leave no artifacts behind
//! 5. Published artifacts and type overrides from settings

use std::collections::HashMap;

use modeltype_core::{ModelTypeError, Settings};
use modeltype_db::{
    Choice, ConcreteField, FieldKind, ForwardRelationField, ManyToManyField, ModelDef,
    ModelRegistry,
};
use modeltype_transpile::{Transpiler, MODULE_FILE, SCHEMA_FILE};
use serde_json::Value;

fn blog() -> ModelRegistry {
    ModelRegistry::builder()
        .register(
            ModelDef::new("Author")
                .field(ConcreteField::new("name", FieldKind::CharField))
                .field(ManyToManyField::new("tags", "Tag")),
        )
        .register(ModelDef::new("Tag").field(ConcreteField::new("label", FieldKind::CharField)))
        .register(
            ModelDef::new("Post")
                .field(ConcreteField::new("title", FieldKind::CharField))
                .field(
                    ConcreteField::new("status", FieldKind::SmallIntegerField)
                        .choices(vec![Choice::new(1, "Draft"), Choice::new(2, "Live")]),
                )
                .field(ForwardRelationField::foreign_key("author", "Author").related_name("posts"))
                .field(ManyToManyField::new("tags", "Tag"))
                .property("excerpt"),
        )
        .build()
        .unwrap()
}

fn settings() -> Settings {
    Settings::default()
}

#[test]
fn test_many_to_many_is_excluded_everywhere() {
    let registry = blog();
    let units = Transpiler::new(&registry, &settings()).units().unwrap();
    for unit in &units {
        assert!(unit.interface.iter().all(|d| d.name != "tags"));
        assert!(unit.relations.iter().all(|d| d.name != "tags"));
        assert!(unit.lookups.iter().all(|d| !d.name.starts_with("tags")));
        assert!(unit.schema.iter().all(|s| s.field_name != "tags"));
        assert!(unit.prefetch_keys.iter().all(|k| !k.contains("tags")));
    }
    let tag = units.iter().find(|u| u.names.model == "Tag").unwrap();
    assert!(tag.reverse_relations.is_empty());
    assert!(tag
        .lookups
        .iter()
        .all(|d| d.name.starts_with("id") || d.name.starts_with("label")));
}

#[test]
fn test_relations_outside_pool() {
    let registry = blog();
    let units = Transpiler::new(&registry, &settings())
        .with_models(["Post"])
        .units()
        .unwrap();
    let post = &units[0];

    let author_id = post.interface.iter().find(|d| d.name == "author_id").unwrap();
    assert_eq!(author_id.ts_type, "number");
    assert!(post.lookups.iter().all(|d| !d.name.starts_with("author")));
    assert!(post.schema.iter().all(|s| s.field_name != "author_id"));
    assert_eq!(post.prefetch_keys, vec!["'excerpt'"]);
    assert!(post.relations.is_empty());
}

#[test]
fn test_cyclic_relations_use_named_references() {
    let registry = ModelRegistry::builder()
        .register(
            ModelDef::new("A").field(
                ForwardRelationField::foreign_key("b", "B")
                    .nullable()
                    .related_name("a_from_b"),
            ),
        )
        .register(
            ModelDef::new("B").field(
                ForwardRelationField::foreign_key("a", "A")
                    .nullable()
                    .related_name("b_from_a"),
            ),
        )
        .build()
        .unwrap();
    let artifacts = Transpiler::new(&registry, &settings()).render().unwrap();
    assert!(artifacts.module.contains("  b?: BQuerySetLookups;"));
    assert!(artifacts.module.contains("  a?: AQuerySetLookups;"));
    assert!(artifacts.module.contains("  b_from_a?: BQuerySetLookups;"));
    assert!(!artifacts.module.contains("b__a"));
    assert!(artifacts.module.contains("'b' | {b: BPrefetchKey}"));
}

#[test]
fn test_failing_unit_writes_nothing() {
    let registry = ModelRegistry::builder()
        .register(
            ModelDef::new("Left").field(
                ForwardRelationField::one_to_one("right", "Right")
                    .primary_key()
                    .related_name("left_of"),
            ),
        )
        .register(
            ModelDef::new("Right").field(
                ForwardRelationField::one_to_one("left", "Left")
                    .primary_key()
                    .related_name("right_of"),
            ),
        )
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("ts");
    let err = Transpiler::new(&registry, &settings())
        .with_dest(&dest)
        .transpile()
        .unwrap_err();
    assert!(matches!(err, ModelTypeError::ImproperlyConfigured(_)));
    assert!(!dest.exists());
}

#[test]
fn test_destination_that_is_a_file() {
    let registry = blog();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("ts");
    std::fs::write(&dest, "not a directory").unwrap();
    let err = Transpiler::new(&registry, &settings())
        .with_dest(&dest)
        .transpile()
        .unwrap_err();
    assert!(matches!(err, ModelTypeError::IoError(_)));
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "not a directory");
}

#[test]
fn test_published_artifacts() {
    let registry = blog();
    let dir = tempfile::tempdir().unwrap();
    let report = Transpiler::new(&registry, &settings())
        .with_dest(dir.path())
        .transpile()
        .unwrap();
    assert_eq!(report.models, 3);

    let module = std::fs::read_to_string(dir.path().join(MODULE_FILE)).unwrap();
    let author = module.find("export interface AuthorFields").unwrap();
    let post = module.find("export interface PostFields").unwrap();
    assert!(author < post);
    assert!(module.contains("  status: 1 | 2;"));
    assert!(module.contains("  status__in?: (1 | 2)[];"));
    assert!(module.contains("  posts(lookups?: PostQuerySetLookups): PostQuerySet;"));

    let schema = std::fs::read_to_string(dir.path().join(SCHEMA_FILE)).unwrap();
    let schema: Value = serde_json::from_str(&schema).unwrap();
    let models = schema["models"].as_array().unwrap();
    assert_eq!(models.len(), 3);
    let post = &models[2];
    assert_eq!(post["reverseRelations"], Value::Array(vec![]));
    let status = post["schema"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["fieldName"] == "status")
        .unwrap();
    assert_eq!(status["choices"][1]["label"], "Live");

    // A second run replaces the artifacts in place.
    Transpiler::new(&registry, &settings())
        .with_dest(dir.path())
        .transpile()
        .unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_type_overrides_from_settings() {
    let registry = blog();
    let settings = Settings {
        field_types: HashMap::from([("CharField".to_string(), "Branded<string>".to_string())]),
        ..Settings::default()
    };
    let artifacts = Transpiler::new(&registry, &settings).render().unwrap();
    assert!(artifacts.module.contains("  title: Branded<string>;"));
    assert!(artifacts.module.contains("  title__in?: Branded<string>[];"));
}
