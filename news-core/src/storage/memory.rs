use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::article::{Article, ArticleId};
use crate::error::StoreError;
use crate::storage::ArticleStore;

#[derive(Debug, Default)]
struct MemoryState {
    articles: HashMap<ArticleId, Article>,
    // article id -> news id, for every stored stub
    pending: HashMap<ArticleId, String>,
}

/// Map-backed store. Articles and the pending index sit behind one lock so
/// readers never see one updated without the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn get(&self, id: &ArticleId) -> Result<Article, StoreError> {
        let inner = self.inner.read().await;
        inner
            .articles
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list(&self) -> Result<Vec<Article>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.articles.values().cloned().collect())
    }

    async fn pending_details_ids(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        let ids: BTreeSet<&String> = inner.pending.values().collect();
        Ok(ids.into_iter().cloned().collect())
    }

    async fn write(&self, mut article: Article) -> Result<(), StoreError> {
        let id = article.assign_id().clone();
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        match inner.articles.get(&id) {
            None => {
                if !article.has_details {
                    inner.pending.insert(id.clone(), article.key.news_id.clone());
                }
                debug!(article_id = %id, has_details = article.has_details, "inserted article");
            }
            Some(existing) if !article.has_details || existing.has_details => {
                return Err(StoreError::AlreadyExists {
                    id,
                    news_id: existing.key.news_id.clone(),
                });
            }
            Some(_) => {
                inner.pending.remove(&id);
                debug!(article_id = %id, "merged details into stub");
            }
        }

        inner.articles.insert(id, article);
        Ok(())
    }

    async fn delete(&self, id: &ArticleId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.pending.remove(id);
        if inner.articles.remove(id).is_none() {
            debug!(article_id = %id, "delete of unknown article ignored");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        debug!("memory store has nothing to disconnect");
        Ok(())
    }
}
