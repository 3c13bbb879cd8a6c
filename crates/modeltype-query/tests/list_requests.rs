//! Integration tests for list and get requests against the in-memory backend.
//!
//! Tests cover:
//! 1. Exclusion-only queries
//! 2. Pagination arithmetic and clamping
//! 3. Payload precedence (page > exists > count > data)
//! 4. Field subsets, ordering, and prefetching
//! 5. Relation-chain filters in OR branches
//! 6. Get-by-pk, including missing rows

use std::collections::HashMap;
use std::sync::Arc;

use modeltype_core::{ModelTypeError, Settings};
use modeltype_db::{
    ConcreteField, FieldKind, ForwardRelationField, InMemoryDatabase, ModelDef, ModelRegistry,
};
use modeltype_query::handlers::{get, list};
use modeltype_query::{ListParams, Payload, RequestContext};
use serde_json::{json, Value};

fn database() -> InMemoryDatabase {
    let registry = ModelRegistry::builder()
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
        .unwrap();
    InMemoryDatabase::new(Arc::new(registry))
}

fn seeded(count: i64) -> InMemoryDatabase {
    let db = database();
    for n in 1..=count {
        db.insert_json("Thing", json!({"name": n.to_string(), "number": n * 10}))
            .unwrap();
    }
    db
}

fn params(value: Value) -> ListParams {
    ListParams::from_value(value).unwrap()
}

async fn list_json(db: &InMemoryDatabase, model: &str, value: Value) -> Value {
    let settings = Settings::default();
    let ctx = RequestContext::new(db.registry(), &settings);
    list(&ctx, db.queryset(model).unwrap(), &params(value))
        .await
        .unwrap()
        .into_json()
        .unwrap()
}

fn names(data: &Value) -> Vec<&str> {
    data.as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row["name"].as_str())
        .collect()
}

#[tokio::test]
async fn test_exclude_only_query() {
    let db = seeded(2);
    let body = list_json(
        &db,
        "Thing",
        json!({"query": {"filters": {}, "exclude": {"name__in": ["1"]}, "or": []}}),
    )
    .await;
    assert_eq!(names(&body), vec!["2"]);
}

#[tokio::test]
async fn test_pagination_arithmetic() {
    let db = seeded(7);
    for (page, expected) in [(1, vec!["1", "2", "3"]), (2, vec!["4", "5", "6"]), (3, vec!["7"])] {
        let body = list_json(&db, "Thing", json!({"page": page, "pagesize": 3})).await;
        assert_eq!(body["num_results"], 7);
        assert_eq!(body["num_pages"], 3);
        assert_eq!(body["page"], page);
        assert_eq!(names(&body["data"]), expected);
    }
}

#[tokio::test]
async fn test_out_of_range_page_is_clamped() {
    let db = seeded(4);
    let body = list_json(&db, "Thing", json!({"page": 9, "pagesize": 3})).await;
    assert_eq!(body["page"], 2);
    assert_eq!(names(&body["data"]), vec!["4"]);
}

#[tokio::test]
async fn test_default_page_size() {
    let db = seeded(30);
    let body = list_json(&db, "Thing", json!({"page": 1})).await;
    assert_eq!(body["num_pages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 25);
}

#[tokio::test]
async fn test_pagination_takes_precedence() {
    let db = seeded(3);
    let body = list_json(&db, "Thing", json!({"page": 1, "exists": true, "count": true})).await;
    assert!(body.is_object());
    assert_eq!(body["num_results"], 3);
}

#[tokio::test]
async fn test_exists_and_count() {
    let db = seeded(3);
    let body = list_json(&db, "Thing", json!({"exists": true, "count": true})).await;
    assert_eq!(body, json!(true));
    let body = list_json(
        &db,
        "Thing",
        json!({"exists": true, "query": {"filters": {"name": "nope"}}}),
    )
    .await;
    assert_eq!(body, json!(false));
    let body = list_json(
        &db,
        "Thing",
        json!({"count": true, "query": {"filters": {"number__gte": 20}}}),
    )
    .await;
    assert_eq!(body, json!(2));
}

#[tokio::test]
async fn test_values_ordering_and_subset() {
    let db = seeded(3);
    let body = list_json(&db, "Thing", json!({"order_by": ["-number"], "values": ["name"]})).await;
    assert_eq!(body, json!([{"name": "3"}, {"name": "2"}, {"name": "1"}]));

    let body = list_json(
        &db,
        "Thing",
        json!({"order_on": ["number"], "fields": ["number"], "page": 1, "pagesize": 2}),
    )
    .await;
    assert_eq!(body["data"], json!([{"number": 10}, {"number": 20}]));
}

#[tokio::test]
async fn test_unknown_subset_field_is_rejected() {
    let db = seeded(1);
    let settings = Settings::default();
    let ctx = RequestContext::new(db.registry(), &settings);
    let err = list(
        &ctx,
        db.queryset("Thing").unwrap(),
        &params(json!({"values": ["secret"]})),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ModelTypeError::ValidationError(_)));
}

#[tokio::test]
async fn test_relation_chains_in_or_branches() {
    let db = seeded(3);
    db.insert_json("ThingChild", json!({"name": "a", "parent": 1}))
        .unwrap();
    db.insert_json("ThingChild", json!({"name": "b", "parent": 3}))
        .unwrap();

    let body = list_json(
        &db,
        "Thing",
        json!({"query": {
            "filters": {"children__name": "a"},
            "or": [{"filters": {"number": 20}}]
        }}),
    )
    .await;
    assert_eq!(names(&body), vec!["1", "2"]);

    let body = list_json(
        &db,
        "ThingChild",
        json!({"query": {"filters": {"parent__number__gt": 15}}, "prefetch": ["parent"]}),
    )
    .await;
    assert_eq!(names(&body), vec!["b"]);
    assert_eq!(body[0]["parent"]["name"], "3");
    assert_eq!(body[0]["parent_id"], 3);
}

#[tokio::test]
async fn test_unknown_filter_path_is_rejected() {
    let db = seeded(1);
    let settings = Settings::default();
    let ctx = RequestContext::new(db.registry(), &settings);
    let err = list(
        &ctx,
        db.queryset("Thing").unwrap(),
        &params(json!({"query": {"filters": {"colour": "red"}}})),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_prefetch_relation_strictness() {
    let db = seeded(1);
    let settings = Settings::default();
    let ctx = RequestContext::new(db.registry(), &settings);
    let err = list(
        &ctx,
        db.queryset("Thing").unwrap(),
        &params(json!({"prefetch": [{"nonexistent_relation": "x"}]})),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ModelTypeError::FieldDoesNotExist(_)));

    let body = list_json(&db, "Thing", json!({"prefetch": ["nonexistent_field"]})).await;
    assert_eq!(names(&body), vec!["1"]);
}

#[tokio::test]
async fn test_raw_query_string_parameters() {
    let db = seeded(3);
    let raw: HashMap<String, String> = [
        ("query", "\u{feff}{\"exclude\": {\"name\": \"2\"}}"),
        ("order_by", "[\"-name\"]"),
        ("count", "false"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let params = ListParams::from_query_map(&raw).unwrap();
    let settings = Settings::default();
    let ctx = RequestContext::new(db.registry(), &settings).with_request_id("raw");
    let payload = list(&ctx, db.queryset("Thing").unwrap(), &params)
        .await
        .unwrap();
    let Payload::Data(rows) = payload else {
        panic!("expected a data payload");
    };
    let got: Vec<&Value> = rows.iter().map(|r| &r["name"]).collect();
    assert_eq!(got, vec![&json!("3"), &json!("1")]);
}

#[tokio::test]
async fn test_get_by_pk() {
    let db = seeded(2);
    db.insert_json("ThingChild", json!({"name": "a", "parent": 2}))
        .unwrap();
    let settings = Settings::default();
    let ctx = RequestContext::new(db.registry(), &settings);

    let payload = get(
        &ctx,
        db.queryset("ThingChild").unwrap(),
        &json!(1),
        &params(json!({"prefetch": ["parent"]})),
    )
    .await
    .unwrap();
    let body = payload.into_json().unwrap();
    assert_eq!(body["name"], "a");
    assert_eq!(body["parent"]["number"], 20);

    let payload = get(
        &ctx,
        db.queryset("Thing").unwrap(),
        &json!(2),
        &params(json!({"values": ["name"]})),
    )
    .await
    .unwrap();
    assert_eq!(payload, Payload::Instance(json!({"name": "2"}).as_object().unwrap().clone()));
}

#[tokio::test]
async fn test_get_missing_pk() {
    let db = seeded(1);
    let settings = Settings::default();
    let ctx = RequestContext::new(db.registry(), &settings);
    let err = get(
        &ctx,
        db.queryset("Thing").unwrap(),
        &json!(99),
        &ListParams::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ModelTypeError::DoesNotExist(_)));
    assert_eq!(err.status_code(), 404);
}
