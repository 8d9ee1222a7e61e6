//! `sportsnews check-store`: drives the configured backend through one full
//! stub-then-details cycle and fails loudly on the first surprise.

use anyhow::{ensure, Context};
use news_core::storage::{self, SharedStore};
use news_core::{normalize, Article, ArticleStore, NewsElement, ServiceConfig};
use tracing::info;

const CHECK_NEWS_ID: &str = "1";

fn check_record() -> NewsElement {
    NewsElement {
        news_article_id: CHECK_NEWS_ID.into(),
        publish_date: "2023-02-17 14:20:33".into(),
        title: "Store check".into(),
        teaser_text: "Stub written by check-store".into(),
        taxonomies: "Check,Store".into(),
        ..Default::default()
    }
}

pub async fn run(config: &ServiceConfig) -> anyhow::Result<()> {
    let store = storage::open(config.storage_kind, &config.sqlite_storage)
        .await
        .context("failed to initialise article store")?;
    let result = exercise(&store, &config.team_id).await;
    store.disconnect().await.context("failed to disconnect article store")?;
    result?;
    info!("store check passed");
    Ok(())
}

async fn exercise(store: &SharedStore, team_id: &str) -> anyhow::Result<()> {
    let stub = normalize(&check_record(), team_id, false)?;
    let id = stub.id.clone();
    info!(article_id = %id, "running store check");

    store.delete(&id).await.context("delete before check")?;

    store.write(stub).await.context("write stub")?;
    let pending = store.pending_details_ids().await?;
    ensure!(
        pending.iter().any(|p| p == CHECK_NEWS_ID),
        "news id {CHECK_NEWS_ID} should be pending details, got {pending:?}"
    );

    let mut record = check_record();
    record.body_text = "<p>Full article written by check-store</p>".into();
    let detailed = normalize(&record, team_id, true)?;
    ensure!(detailed.id == id, "detailed article resolved to a different id");
    store.write(detailed.clone()).await.context("write detailed article")?;

    let stored = store.get(&id).await.context("get detailed article")?;
    ensure!(stored == detailed, "stored article differs from the detailed write");

    let listed: Vec<Article> = store
        .list()
        .await?
        .into_iter()
        .filter(|a| a.id == id)
        .collect();
    ensure!(
        listed == [detailed],
        "list returned {} copies of the article",
        listed.len()
    );

    let pending = store.pending_details_ids().await?;
    ensure!(
        !pending.iter().any(|p| p == CHECK_NEWS_ID),
        "news id {CHECK_NEWS_ID} is still pending after details"
    );
    Ok(())
}
