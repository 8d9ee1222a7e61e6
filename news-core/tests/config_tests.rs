use std::fs;

use news_core::{ConfigError, OnWriteError, ServiceConfig, StorageKind};
use tempfile::TempDir;

const DEFAULTS: &str = r#"{
  "teamId": "t94",
  "list": { "url": "https://feeds.example/list", "count": 50, "schedule": "0 */5 * * * *" },
  "details": { "url": "https://feeds.example/details", "schedule": "30 * * * * *" },
  "storageKind": "memory",
  "sqliteStorage": { "uri": "data", "name": "sportsnews", "articlesColl": "articles" }
}"#;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn custom_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let default = write(&dir, "default.json", DEFAULTS);
    let custom = write(
        &dir,
        "custom.json",
        r#"{
          "list": { "count": 10 },
          "details": { "onWriteError": "stop" },
          "storageKind": "sqlite",
          "sqliteStorage": { "uri": "/var/lib/sportsnews" }
        }"#,
    );

    let config = ServiceConfig::load(&default, Some(&custom)).unwrap();
    assert_eq!(config.list.count, 10);
    assert_eq!(config.list.url, "https://feeds.example/list");
    assert_eq!(config.details.on_write_error, OnWriteError::Stop);
    assert_eq!(config.storage_kind, StorageKind::Sqlite);
    assert_eq!(config.sqlite_storage.uri, "/var/lib/sportsnews");
    assert_eq!(config.sqlite_storage.articles_coll, "articles");
}

#[test]
fn missing_custom_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let default = write(&dir, "default.json", DEFAULTS);

    let config = ServiceConfig::load(&default, Some(&dir.path().join("absent.json"))).unwrap();
    assert_eq!(config.team_id, "t94");
    assert_eq!(config.details.on_write_error, OnWriteError::Skip);
    assert!(config.run_once_at_boot);
}

#[test]
fn missing_default_file_uses_built_in_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig::from_file(&dir.path().join("nope.json")).unwrap();
    assert_eq!(config.list.count, 50);
    assert_eq!(config.storage_kind, StorageKind::Memory);
}

#[test]
fn malformed_custom_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let default = write(&dir, "default.json", DEFAULTS);
    let custom = write(&dir, "custom.json", "{ \"list\": ");

    let err = ServiceConfig::load(&default, Some(&custom)).unwrap_err();
    assert!(matches!(err, ConfigError::Json { .. }), "{err}");
}

#[test]
fn invalid_merged_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let default = write(&dir, "default.json", DEFAULTS);
    let custom = write(&dir, "custom.json", r#"{ "list": { "schedule": "every tuesday" } }"#);

    let err = ServiceConfig::load(&default, Some(&custom)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
}

#[test]
fn shipped_default_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/default.json");
    let config = ServiceConfig::from_file(&path).unwrap();
    assert_eq!(config.team_id, "t94");
    assert_eq!(config.storage_kind, StorageKind::Memory);
}
