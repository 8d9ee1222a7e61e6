//! Read-only facade for the presentation layer.
//!
//! Lookup misses come back as [`ReadError::NotFound`]; every other store
//! fault is logged here and surfaces only as the opaque [`ReadError::Internal`].

use thiserror::Error;
use tracing::error;

use crate::article::{Article, ArticleId};
use crate::error::StoreError;
use crate::storage::SharedStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("article not found")]
    NotFound,
    #[error("internal server error")]
    Internal,
}

#[derive(Clone)]
pub struct ArticleService {
    store: SharedStore,
}

impl ArticleService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn article(&self, id: &str) -> Result<Article, ReadError> {
        match self.store.get(&ArticleId::from(id)).await {
            Ok(article) => Ok(article),
            // misses are routine, not worth a log line
            Err(StoreError::NotFound(_)) => Err(ReadError::NotFound),
            Err(err) => {
                error!(article_id = %id, error = %err, "failure while getting article from storage");
                Err(ReadError::Internal)
            }
        }
    }

    pub async fn articles(&self) -> Result<Vec<Article>, ReadError> {
        self.store.list().await.map_err(|err| {
            error!(error = %err, "failure while listing articles from storage");
            ReadError::Internal
        })
    }
}
