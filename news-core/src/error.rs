use thiserror::Error;

use crate::article::ArticleId;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unparseable publish date {value:?}: {source}")]
    PublishDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("article {0} not found")]
    NotFound(ArticleId),
    #[error("article {id} (news id {news_id}) already exists")]
    AlreadyExists { id: ArticleId, news_id: String },
    #[error("could not write article {id}: {reason}")]
    WriteFailed { id: ArticleId, reason: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored article could not be decoded: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("feed decoding error: {0}")]
    Decode(#[from] quick_xml::DeError),
    #[error("feed record rejected: {0}")]
    Normalize(#[from] ParseError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("poll cancelled")]
    Cancelled,
    #[error("poller task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression {expr:?}: {source}")]
    Cron {
        expr: String,
        #[source]
        source: cron::error::Error,
    },
    #[error("invalid interval {0:?}, expected `@every <duration>` such as `@every 90s`")]
    Interval(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
