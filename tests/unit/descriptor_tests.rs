use std::collections::BTreeMap;

use agent_bridge::config::BridgeConfig;
use agent_bridge::descriptor::{discard, DescriptorStore, ToolServerEntry};
use agent_bridge::AppError;
use serde_json::Value;

fn store(dir: &std::path::Path) -> DescriptorStore {
    DescriptorStore::new(
        dir,
        "schema-db",
        ToolServerEntry {
            command: "/usr/bin/agent-bridge-tools".into(),
            args: vec!["--database".into(), "sqlite://db/dev.sqlite3".into()],
            env: BTreeMap::new(),
        },
    )
}

fn read_json(path: &std::path::Path) -> Value {
    let raw = std::fs::read_to_string(path).expect("descriptor readable");
    serde_json::from_str(&raw).expect("descriptor is JSON")
}

#[test]
fn materialize_writes_server_entry() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(temp.path());

    let path = store.materialize("abc-123").expect("materialize");

    assert_eq!(path, temp.path().join("mcp_config_abc-123.json"));
    let json = read_json(&path);
    let entry = &json["mcpServers"]["schema-db"];
    assert_eq!(entry["command"], "/usr/bin/agent-bridge-tools");
    assert_eq!(entry["args"][0], "--database");
    assert_eq!(entry["args"][1], "sqlite://db/dev.sqlite3");
    assert!(entry["env"].as_object().expect("env object").is_empty());
}

#[test]
fn materialize_creates_missing_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("tmp").join("mcp_configs");
    let store = store(&dir);

    let path = store.materialize("s1").expect("materialize");
    assert!(path.starts_with(&dir));
    assert!(path.exists());
}

/// Re-materializing for the same session replaces the previous file.
#[test]
fn materialize_overwrites_existing_descriptor() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("mcp_config_s1.json");
    std::fs::write(&path, "stale").expect("write");

    let written = store(temp.path()).materialize("s1").expect("materialize");

    assert_eq!(written, path);
    assert!(read_json(&path)["mcpServers"].is_object());
    let leftovers: Vec<_> = std::fs::read_dir(temp.path()).expect("read dir").collect();
    assert_eq!(leftovers.len(), 1, "staging file must not linger");
}

#[test]
fn unsafe_session_ids_are_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(temp.path());

    for id in ["", "../escape", "a/b", "with space"] {
        let result = store.materialize(id);
        assert!(matches!(result, Err(AppError::Config(_))), "id {id:?} accepted");
    }
}

#[test]
fn discard_removes_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = store(temp.path()).materialize("s2").expect("materialize");

    discard(&path).expect("discard");
    assert!(!path.exists());
}

#[test]
fn discard_missing_file_is_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    discard(&temp.path().join("never-written.json")).expect("absent file is fine");
}

#[test]
fn from_config_appends_database_flag() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().to_string_lossy().to_string();
    let config = BridgeConfig::from_toml_str(&format!(
        r#"
workspace_root = '{root}'
database_url = "sqlite://data/app.sqlite3"

[tool_server]
name = "db"
command = "tools"
args = ["--log-format", "json"]
"#
    ))
    .expect("valid config");

    let store = DescriptorStore::from_config(&config);
    assert_eq!(store.dir(), config.descriptor_dir().as_path());

    let path = store.materialize("s3").expect("materialize");
    let json = read_json(&path);
    let entry = &json["mcpServers"]["db"];
    assert_eq!(entry["command"], "tools");
    assert_eq!(
        entry["args"],
        serde_json::json!(["--log-format", "json", "--database", "sqlite://data/app.sqlite3"])
    );
}
