pub mod api;
pub mod article;
pub mod config;
pub mod error;
pub mod feed;
mod identity;
pub mod poller;
pub mod schedule;
pub mod storage;

pub use api::{ArticleService, ReadError};
pub use article::{Article, ArticleId, ArticleKey};
pub use config::{OnWriteError, ServiceConfig, StorageKind};
pub use error::{ConfigError, ParseError, PollError, ScheduleError, StoreError};
pub use feed::{normalize, NewsElement};
pub use poller::{poll_details_once, poll_list_once, spawn_poller, Event, PollConfig, PollContext, PollerHandle};
pub use schedule::Trigger;
pub use storage::{ArticleStore, MemoryStore, SharedStore, SqliteStore};
