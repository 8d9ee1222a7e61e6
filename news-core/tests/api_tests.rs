use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use news_core::{
    Article, ArticleId, ArticleKey, ArticleService, ArticleStore, MemoryStore, ReadError,
    StoreError,
};

fn stub(news_id: &str) -> Article {
    let mut article = Article::stub(ArticleKey {
        team_id: "t94".into(),
        news_id: news_id.into(),
        published: Utc.with_ymd_and_hms(2024, 11, 22, 19, 44, 51).unwrap(),
    });
    article.title = Some(format!("News {news_id}"));
    article.assign_id();
    article
}

/// A backend whose every call fails with a database fault.
struct BrokenStore;

#[async_trait]
impl ArticleStore for BrokenStore {
    async fn get(&self, _id: &ArticleId) -> Result<Article, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }
    async fn list(&self) -> Result<Vec<Article>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }
    async fn pending_details_ids(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }
    async fn write(&self, article: Article) -> Result<(), StoreError> {
        Err(StoreError::WriteFailed {
            id: article.id,
            reason: "read only".into(),
        })
    }
    async fn delete(&self, _id: &ArticleId) -> Result<(), StoreError> {
        Ok(())
    }
    async fn disconnect(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn article_lookup_hits_and_misses() {
    let store = Arc::new(MemoryStore::new());
    let a = stub("1");
    store.write(a.clone()).await.unwrap();
    let service = ArticleService::new(store);

    assert_eq!(service.article(a.id.as_str()).await.unwrap(), a);
    assert_eq!(
        service.article("00000000-0000-0000-0000-000000000000").await,
        Err(ReadError::NotFound)
    );
}

#[tokio::test]
async fn articles_lists_everything_once() {
    let store = Arc::new(MemoryStore::new());
    for id in ["1", "2", "3"] {
        store.write(stub(id)).await.unwrap();
    }
    let service = ArticleService::new(store);

    let mut titles: Vec<_> = service
        .articles()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|a| a.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["News 1", "News 2", "News 3"]);
}

#[tokio::test]
async fn backend_faults_become_internal() {
    let service = ArticleService::new(Arc::new(BrokenStore));
    assert_eq!(service.article("anything").await, Err(ReadError::Internal));
    assert_eq!(service.articles().await, Err(ReadError::Internal));
}

#[test]
fn article_json_hides_news_id_and_empty_fields() {
    let json = serde_json::to_value(stub("444541")).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj["teamId"], "t94");
    assert_eq!(obj["title"], "News 444541");
    assert_eq!(obj["hasDetails"], false);
    assert!(obj.contains_key("id"));
    assert!(obj.contains_key("published"));
    assert!(!obj.contains_key("newsId"));
    assert!(!obj.contains_key("content"));
    assert!(!obj.contains_key("type"));
}
