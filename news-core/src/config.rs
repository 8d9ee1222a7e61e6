use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::schedule::Trigger;
use crate::storage::sqlite::validate_table_name;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub team_id: String,
    pub run_once_at_boot: bool,
    pub list: ListConfig,
    pub details: DetailsConfig,
    pub http: HttpConfig,
    pub storage_kind: StorageKind,
    pub sqlite_storage: SqliteStorageConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListConfig {
    pub url: String,
    pub count: u32,
    pub schedule: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailsConfig {
    pub url: String,
    pub schedule: String,
    pub on_write_error: OnWriteError,
}

/// What the details job does after a write returns `AlreadyExists` or `WriteFailed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnWriteError {
    /// Log and continue with the next pending id.
    #[default]
    Skip,
    /// Log and end the run.
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqliteStorageConfig {
    /// Directory (optionally `sqlite://`-prefixed) holding the database, or `sqlite::memory:`.
    pub uri: String,
    pub name: String,
    pub articles_coll: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            team_id: "t94".into(),
            run_once_at_boot: true,
            list: ListConfig::default(),
            details: DetailsConfig::default(),
            http: HttpConfig::default(),
            storage_kind: StorageKind::default(),
            sqlite_storage: SqliteStorageConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            url: "https://www.wearehullcity.co.uk/api/incrowd/getnewlistinformation".into(),
            count: 50,
            schedule: "0 */5 * * * *".into(),
        }
    }
}

impl Default for DetailsConfig {
    fn default() -> Self {
        Self {
            url: "https://www.wearehullcity.co.uk/api/incrowd/getnewsarticleinformation".into(),
            schedule: "30 * * * * *".into(),
            on_write_error: OnWriteError::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: concat!("sportsnews/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl Default for SqliteStorageConfig {
    fn default() -> Self {
        Self {
            uri: "data".into(),
            name: "sportsnews".into(),
            articles_coll: "articles".into(),
            user: None,
            password: None,
            timeout_seconds: 10,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

impl SqliteStorageConfig {
    pub fn has_credentials(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        set(&self.user) || set(&self.password)
    }
}

impl ServiceConfig {
    /// Loads the default configuration, then merges the custom file over it.
    ///
    /// A missing default file falls back to built-in defaults; a missing custom
    /// file is skipped. Files that exist but do not parse are errors.
    pub fn load(default_path: &Path, custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = match read_json(default_path)? {
            Some(value) => value,
            None => {
                warn!(path = %default_path.display(), "default config not found, using built-in defaults");
                serde_json::to_value(Self::default()).map_err(|source| ConfigError::Json {
                    path: default_path.display().to_string(),
                    source,
                })?
            }
        };

        if let Some(custom_path) = custom_path {
            match read_json(custom_path)? {
                Some(overlay) => {
                    info!(path = %custom_path.display(), "applying custom config");
                    merge_json(&mut merged, overlay);
                }
                None => info!(path = %custom_path.display(), "custom config not found, skipping"),
            }
        }

        let config: Self = serde_json::from_value(merged).map_err(|source| ConfigError::Json {
            path: custom_path.unwrap_or(default_path).display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a single file, without layering.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(path, None)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.team_id.trim().is_empty() {
            return Err(ConfigError::Invalid("teamId cannot be empty".into()));
        }
        validate_url("list.url", &self.list.url)?;
        validate_url("details.url", &self.details.url)?;
        if self.list.count == 0 {
            return Err(ConfigError::Invalid("list.count must be at least 1".into()));
        }
        for (name, expr) in [
            ("list.schedule", &self.list.schedule),
            ("details.schedule", &self.details.schedule),
        ] {
            Trigger::parse(expr).map_err(|e| ConfigError::Invalid(format!("{name}: {e}")))?;
        }
        if self.storage_kind == StorageKind::Sqlite {
            validate_table_name(&self.sqlite_storage.articles_coll)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if self.sqlite_storage.name.trim().is_empty() {
                return Err(ConfigError::Invalid("sqliteStorage.name cannot be empty".into()));
            }
        }
        Ok(())
    }
}

fn validate_url(name: &str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid(format!("{name} {value:?}: {e}")))
}

fn read_json(path: &Path) -> Result<Option<Value>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
}

/// Objects merge key by key; anything else in `overlay` replaces `base`.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_overrides_nested_keys_only() {
        let mut base = json!({
            "teamId": "t94",
            "list": { "url": "http://a/list", "count": 50 },
            "storageKind": "memory"
        });
        merge_json(
            &mut base,
            json!({ "list": { "count": 10 }, "storageKind": "sqlite" }),
        );
        assert_eq!(base["list"]["url"], "http://a/list");
        assert_eq!(base["list"]["count"], 10);
        assert_eq!(base["storageKind"], "sqlite");
        assert_eq!(base["teamId"], "t94");
    }

    #[test]
    fn defaults_are_valid() {
        ServiceConfig::default().validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = ServiceConfig::default();
        config.list.count = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.details.schedule = "every now and then".into();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.list.url = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.storage_kind = StorageKind::Sqlite;
        config.sqlite_storage.articles_coll = "articles; DROP TABLE x".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_storage_kind_fails() {
        let err = serde_json::from_value::<ServiceConfig>(json!({ "storageKind": "mongo" }));
        assert!(err.is_err());
    }

    #[test]
    fn credentials_detection() {
        let mut sqlite = SqliteStorageConfig::default();
        assert!(!sqlite.has_credentials());
        sqlite.user = Some(String::new());
        assert!(!sqlite.has_credentials());
        sqlite.password = Some("secret".into());
        assert!(sqlite.has_credentials());
    }
}
