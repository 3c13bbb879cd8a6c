//! End-to-end tests through the facade crate.
//!
//! Tests cover:
//! 1. One registry drives both generation and request handling
//! 2. A generated lookup key is accepted by the request path

use std::sync::Arc;

use modeltype::prelude::*;
use modeltype::query::handlers::list;
use serde_json::json;

fn registry() -> ModelRegistry {
    ModelRegistry::builder()
        .register(
            ModelDef::new("Thing")
                .field(ConcreteField::new("name", FieldKind::CharField))
                .field(ConcreteField::new("number", FieldKind::IntegerField).nullable()),
        )
        .register(
            ModelDef::new("ThingChild")
                .field(ConcreteField::new("name", FieldKind::CharField))
                .field(
                    ForwardRelationField::foreign_key("parent", "Thing")
                        .nullable()
                        .related_name("children"),
                ),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_generated_keys_are_served() {
    let registry = Arc::new(registry());
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        transpile_dest: dir.path().to_path_buf(),
        ..Settings::default()
    };

    Transpiler::new(&registry, &settings).transpile().unwrap();
    let module = std::fs::read_to_string(dir.path().join("models.ts")).unwrap();
    assert!(module.contains("  parent?: ThingQuerySetLookups;"));
    assert!(!module.contains("parent__number"));
    assert!(module.contains("  number__gte?: number;"));

    let db = InMemoryDatabase::new(Arc::clone(&registry));
    for (name, number) in [("a", 1), ("b", 5), ("c", 9)] {
        db.insert_json("Thing", json!({"name": name, "number": number}))
            .unwrap();
    }
    db.insert_json("ThingChild", json!({"name": "kid", "parent": 3}))
        .unwrap();

    let ctx = RequestContext::new(&registry, &settings);
    let params = ListParams::from_value(json!({
        "query": {"filters": {"number__gte": 5}, "or": [{"filters": {"children__name": "kid"}}]},
        "order_by": ["-number"],
        "page": 1,
        "pagesize": 1
    }))
    .unwrap();
    let body = list(&ctx, db.queryset("Thing").unwrap(), &params)
        .await
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(body["num_results"], 2);
    assert_eq!(body["num_pages"], 2);
    assert_eq!(body["data"][0]["name"], "c");
}
