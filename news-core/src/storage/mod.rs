//! Article storage.
//!
//! Every backend applies the same write reconciliation:
//!
//! | existing        | incoming stub   | incoming detailed |
//! |-----------------|-----------------|-------------------|
//! | none            | insert, pending | insert            |
//! | stub            | `AlreadyExists` | replace, clear pending |
//! | detailed        | `AlreadyExists` | `AlreadyExists`   |
//!
//! The decision and the mutation happen atomically per article id.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::article::{Article, ArticleId};
use crate::config::{SqliteStorageConfig, StorageKind};
use crate::error::StoreError;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn get(&self, id: &ArticleId) -> Result<Article, StoreError>;

    /// All stored articles, in no particular order.
    async fn list(&self) -> Result<Vec<Article>, StoreError>;

    /// Feed-native news ids of stored articles that are still stubs.
    async fn pending_details_ids(&self) -> Result<Vec<String>, StoreError>;

    async fn write(&self, article: Article) -> Result<(), StoreError>;

    /// Removes the article and its pending entry. Unknown ids are a no-op.
    async fn delete(&self, id: &ArticleId) -> Result<(), StoreError>;

    async fn disconnect(&self) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn ArticleStore>;

/// Opens the backend selected by configuration.
pub async fn open(
    kind: StorageKind,
    sqlite: &SqliteStorageConfig,
) -> Result<SharedStore, StoreError> {
    match kind {
        StorageKind::Memory => {
            info!("using in-memory article store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageKind::Sqlite => {
            let store = SqliteStore::connect(sqlite).await?;
            Ok(Arc::new(store))
        }
    }
}
