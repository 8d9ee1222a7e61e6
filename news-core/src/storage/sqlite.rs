use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::article::{Article, ArticleId, ArticleKey};
use crate::config::SqliteStorageConfig;
use crate::error::StoreError;
use crate::storage::ArticleStore;

pub const MEMORY_URI: &str = "sqlite::memory:";

const COLUMNS: &str = "id, team_id, news_id, published, title, teaser, content, image_url, \
                       gallery_urls, opta_match_id, url, video_url, categories, has_details";

/// Durable store on SQLite. One row per article keyed by id; pending ids are
/// a live filter on `has_details = 0`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteStore {
    pub async fn connect(config: &SqliteStorageConfig) -> Result<Self, StoreError> {
        validate_table_name(&config.articles_coll)?;
        if config.has_credentials() {
            warn!("sqlite backend has no authentication, configured credentials are ignored");
        }

        let timeout = Duration::from_secs(config.timeout_seconds);
        let pool = if config.uri == MEMORY_URI {
            // every in-memory connection is its own database, so keep exactly one alive
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .acquire_timeout(timeout)
                .connect_with(SqliteConnectOptions::from_str(MEMORY_URI)?.busy_timeout(timeout))
                .await?
        } else {
            let dir = config.uri.strip_prefix("sqlite://").unwrap_or(&config.uri);
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                StoreError::InvalidConfig(format!("cannot create database directory {dir}: {e}"))
            })?;
            let file = Path::new(dir).join(format!("{}.db", config.name));
            info!(path = %file.display(), "opening sqlite article store");

            let options = SqliteConnectOptions::new()
                .filename(&file)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(timeout);
            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(timeout)
                .connect_with(options)
                .await?
        };

        Self::with_pool(pool, &config.articles_coll).await
    }

    /// Wraps an existing pool and creates the articles table if needed.
    pub async fn with_pool(pool: SqlitePool, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id            TEXT PRIMARY KEY NOT NULL,
                team_id       TEXT NOT NULL,
                news_id       TEXT NOT NULL,
                published     TEXT NOT NULL,
                title         TEXT,
                teaser        TEXT,
                content       TEXT,
                image_url     TEXT,
                gallery_urls  TEXT,
                opta_match_id TEXT,
                url           TEXT,
                video_url     TEXT,
                categories    TEXT NOT NULL DEFAULT '[]',
                has_details   INTEGER NOT NULL DEFAULT 0
            )
            "#
        ))
        .execute(&pool)
        .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_has_details ON {table} (has_details)"
        ))
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            table: table.to_owned(),
        })
    }

    async fn insert_if_absent(&self, article: &Article, categories: &str) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "INSERT INTO {} ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO NOTHING",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(article.id.as_str())
            .bind(&article.key.team_id)
            .bind(&article.key.news_id)
            .bind(article.key.published)
            .bind(&article.title)
            .bind(&article.teaser)
            .bind(&article.content)
            .bind(&article.image_url)
            .bind(&article.gallery_urls)
            .bind(&article.opta_match_id)
            .bind(&article.url)
            .bind(&article.video_url)
            .bind(categories)
            .bind(article.has_details)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Replaces a stub row with detailed content. Leaves detailed rows alone.
    async fn merge_into_stub(&self, article: &Article, categories: &str) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET team_id = ?, news_id = ?, published = ?, title = ?, teaser = ?, \
             content = ?, image_url = ?, gallery_urls = ?, opta_match_id = ?, url = ?, \
             video_url = ?, categories = ?, has_details = 1 \
             WHERE id = ? AND has_details = 0",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(&article.key.team_id)
            .bind(&article.key.news_id)
            .bind(article.key.published)
            .bind(&article.title)
            .bind(&article.teaser)
            .bind(&article.content)
            .bind(&article.image_url)
            .bind(&article.gallery_urls)
            .bind(&article.opta_match_id)
            .bind(&article.url)
            .bind(&article.video_url)
            .bind(categories)
            .bind(article.id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn reconcile(&self, article: &Article, categories: &str) -> Result<bool, sqlx::Error> {
        if !article.has_details {
            return self.insert_if_absent(article, categories).await;
        }
        if self.merge_into_stub(article, categories).await? {
            return Ok(true);
        }
        if self.insert_if_absent(article, categories).await? {
            return Ok(true);
        }
        // a stub may have landed between the update and the insert
        self.merge_into_stub(article, categories).await
    }

    async fn existing_news_id(&self, id: &ArticleId) -> String {
        let sql = format!("SELECT news_id FROM {} WHERE id = ?", self.table);
        match sqlx::query_scalar::<_, String>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
        {
            Ok(news_id) => news_id.unwrap_or_default(),
            Err(e) => {
                debug!(article_id = %id, error = %e, "could not look up news id of existing article");
                String::new()
            }
        }
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn get(&self, id: &ArticleId) -> Result<Article, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM {} WHERE id = ?", self.table);
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => article_from_row(&row),
            None => Err(StoreError::NotFound(id.clone())),
        }
    }

    async fn list(&self) -> Result<Vec<Article>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM {}", self.table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(article_from_row).collect()
    }

    async fn pending_details_ids(&self) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            "SELECT DISTINCT news_id FROM {} WHERE has_details = 0 ORDER BY news_id",
            self.table
        );
        let ids = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn write(&self, mut article: Article) -> Result<(), StoreError> {
        let id = article.assign_id().clone();
        let categories =
            serde_json::to_string(&article.categories).map_err(|e| StoreError::WriteFailed {
                id: id.clone(),
                reason: e.to_string(),
            })?;

        match self.reconcile(&article, &categories).await {
            Ok(true) => {
                debug!(article_id = %id, has_details = article.has_details, "article written");
                Ok(())
            }
            Ok(false) => Err(StoreError::AlreadyExists {
                news_id: self.existing_news_id(&id).await,
                id,
            }),
            Err(e) => Err(StoreError::WriteFailed {
                id,
                reason: e.to_string(),
            }),
        }
    }

    async fn delete(&self, id: &ArticleId) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table);
        let result = sqlx::query(&sql).bind(id.as_str()).execute(&self.pool).await?;
        debug!(article_id = %id, removed = result.rows_affected(), "delete");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        info!("sqlite article store closed");
        Ok(())
    }
}

fn article_from_row(row: &SqliteRow) -> Result<Article, StoreError> {
    let categories: String = row.try_get("categories")?;
    let published: DateTime<Utc> = row.try_get("published")?;
    Ok(Article {
        key: ArticleKey {
            team_id: row.try_get("team_id")?,
            news_id: row.try_get("news_id")?,
            published,
        },
        id: ArticleId::from(row.try_get::<String, _>("id")?),
        title: row.try_get("title")?,
        teaser: row.try_get("teaser")?,
        content: row.try_get("content")?,
        image_url: row.try_get("image_url")?,
        gallery_urls: row.try_get("gallery_urls")?,
        opta_match_id: row.try_get("opta_match_id")?,
        url: row.try_get("url")?,
        video_url: row.try_get("video_url")?,
        categories: serde_json::from_str(&categories)?,
        has_details: row.try_get("has_details")?,
    })
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidConfig(format!(
            "articles collection {name:?} is not a valid table name"
        )))
    }
}
