//! Integration tests for the built-in management commands.
//!
//! Tests cover:
//! 1. `transpile` writes artifacts for a schema file, honoring --out and --models
//! 2. `check` fails on a schema that cannot be generated
//! 3. Settings files are loaded and applied

use std::path::Path;

use modeltype_cli::command::{settings_path, CommandRegistry};
use modeltype_cli::commands::register_builtin_commands;
use modeltype_core::{settings_loader, Settings};
use serde_json::json;

fn registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    registry
}

fn write_schema(dir: &Path) -> String {
    let schema = json!({"models": [
        {"name": "Thing", "fields": [
            {"field": "concrete", "name": "name", "kind": {"type": "CharField"}}
        ]},
        {"name": "ThingChild", "fields": [
            {"field": "forward_relation", "name": "parent", "to": "Thing", "related_name": "children"}
        ]}
    ]});
    let path = dir.join("schema.json");
    std::fs::write(&path, schema.to_string()).unwrap();
    path.display().to_string()
}

async fn run(args: &[&str], settings: &Settings) -> modeltype_core::ModelTypeResult<()> {
    let registry = registry();
    let matches = registry.build_cli().try_get_matches_from(args).unwrap();
    registry.execute(&matches, settings).await
}

#[tokio::test]
async fn test_transpile_command_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    let out = dir.path().join("gen");
    let out_arg = out.display().to_string();

    run(
        &["modeltype", "transpile", "--schema", &schema, "--out", &out_arg],
        &Settings::default(),
    )
    .await
    .unwrap();
    let module = std::fs::read_to_string(out.join("models.ts")).unwrap();
    assert!(module.contains("export interface ThingChildFields"));
    assert!(out.join("schema.json").exists());

    let only = dir.path().join("only");
    let only_arg = only.display().to_string();
    run(
        &[
            "modeltype", "transpile", "--schema", &schema, "--out", &only_arg, "--models",
            "ThingChild",
        ],
        &Settings::default(),
    )
    .await
    .unwrap();
    let module = std::fs::read_to_string(only.join("models.ts")).unwrap();
    assert!(!module.contains("export interface ThingFields"));
    assert!(!module.contains("parent?: ThingQuerySetLookups"));
}

#[tokio::test]
async fn test_check_command() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    run(&["modeltype", "check", "--schema", &schema], &Settings::default())
        .await
        .unwrap();

    let broken = dir.path().join("broken.json");
    std::fs::write(
        &broken,
        json!({"models": [
            {"name": "Left", "fields": [
                {"field": "forward_relation", "name": "right", "to": "Right",
                 "one_to_one": true, "primary_key": true, "related_name": "left_of"}
            ]},
            {"name": "Right", "fields": [
                {"field": "forward_relation", "name": "left", "to": "Left",
                 "one_to_one": true, "primary_key": true, "related_name": "right_of"}
            ]}
        ]})
        .to_string(),
    )
    .unwrap();
    let broken = broken.display().to_string();
    assert!(run(&["modeltype", "check", "--schema", &broken], &Settings::default())
        .await
        .is_err());
}

#[tokio::test]
async fn test_settings_file_sets_destination() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    let dest = dir.path().join("from-settings");
    let settings_file = dir.path().join("modeltype.toml");
    std::fs::write(
        &settings_file,
        format!("transpile_dest = {:?}\n", dest.display().to_string()),
    )
    .unwrap();
    let settings_arg = settings_file.display().to_string();

    let args = ["modeltype", "transpile", "--schema", &schema, "--settings", &settings_arg];
    let matches = registry().build_cli().try_get_matches_from(args).unwrap();
    let path = settings_path(&matches).unwrap();
    let settings = settings_loader::from_toml_file(&path).unwrap();
    assert_eq!(settings.transpile_dest, dest);

    registry().execute(&matches, &settings).await.unwrap();
    assert!(dest.join("models.ts").exists());
}
