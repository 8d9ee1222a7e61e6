//! List and details polling jobs and the background scheduler that drives them.
//!
//! The list job stores every record of the list feed as a stub. The details
//! job asks the store which stubs are still waiting for enrichment and fetches
//! each one from the detail feed. Both jobs run in their own task, each
//! sequentially with itself, and may overlap with each other.

use chrono::Utc;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::article::Article;
use crate::config::{OnWriteError, ServiceConfig};
use crate::error::{PollError, ScheduleError, StoreError};
use crate::feed;
use crate::schedule::Trigger;
use crate::storage::SharedStore;

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub team_id: String,
    pub run_once_at_boot: bool,
    pub list: ListJob,
    pub details: DetailsJob,
}

#[derive(Debug, Clone)]
pub struct ListJob {
    pub url: String,
    pub count: u32,
    pub trigger: Trigger,
}

#[derive(Debug, Clone)]
pub struct DetailsJob {
    pub url: String,
    pub trigger: Trigger,
    pub on_write_error: OnWriteError,
}

impl PollConfig {
    pub fn from_service_config(config: &ServiceConfig) -> Result<Self, ScheduleError> {
        Ok(Self {
            team_id: config.team_id.clone(),
            run_once_at_boot: config.run_once_at_boot,
            list: ListJob {
                url: config.list.url.clone(),
                count: config.list.count,
                trigger: Trigger::parse(&config.list.schedule)?,
            },
            details: DetailsJob {
                url: config.details.url.clone(),
                trigger: Trigger::parse(&config.details.schedule)?,
                on_write_error: config.details.on_write_error,
            },
        })
    }
}

/// Everything a single run needs.
#[derive(Clone)]
pub struct PollContext {
    pub client: Client,
    pub store: SharedStore,
    pub team_id: String,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRunReport {
    /// Records in the list document.
    pub fetched: usize,
    /// New stubs written.
    pub stored: usize,
    /// Records the store already had.
    pub known: usize,
    /// Records that failed normalization.
    pub skipped: usize,
    /// Records whose write failed.
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailsRunReport {
    pub pending: usize,
    pub enriched: usize,
    /// Ids whose detail could not be fetched, decoded or normalized.
    pub skipped: usize,
    /// Ids whose write returned `AlreadyExists` or `WriteFailed`.
    pub rejected: usize,
    pub stopped_early: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ListPolled(ListRunReport),
    DetailsPolled(DetailsRunReport),
}

pub struct PollerHandle {
    cancel: CancellationToken,
    jobs: Vec<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn stop(self) -> Result<(), PollError> {
        self.cancel.cancel();
        for job in self.jobs {
            job.await?;
        }
        Ok(())
    }
}

/// Starts both jobs on the current runtime and returns immediately.
///
/// With `run_once_at_boot` each job runs once as soon as its task starts,
/// then follows its trigger. Cancelling `cancel` (or calling
/// [`PollerHandle::stop`]) aborts in-flight requests and ends both tasks.
pub fn spawn_poller(
    store: SharedStore,
    config: PollConfig,
    client: Client,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
) -> PollerHandle {
    let ctx = PollContext {
        client,
        store,
        team_id: config.team_id.clone(),
        cancel: cancel.clone(),
    };
    info!(
        team_id = %config.team_id,
        list_url = %config.list.url,
        details_url = %config.details.url,
        "starting news poller"
    );

    let jobs = [Job::List(config.list), Job::Details(config.details)]
        .into_iter()
        .map(|job| {
            tokio::spawn(job_loop(
                job,
                ctx.clone(),
                events.clone(),
                config.run_once_at_boot,
            ))
        })
        .collect();

    PollerHandle { cancel, jobs }
}

enum Job {
    List(ListJob),
    Details(DetailsJob),
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::List(_) => "list",
            Job::Details(_) => "details",
        }
    }

    fn trigger(&self) -> &Trigger {
        match self {
            Job::List(job) => &job.trigger,
            Job::Details(job) => &job.trigger,
        }
    }

    async fn run(&self, ctx: &PollContext, events: &mpsc::Sender<Event>) {
        let event = match self {
            Job::List(job) => match poll_list_once(ctx, job).await {
                Ok(report) => Event::ListPolled(report),
                Err(err) => {
                    error!(error = %err, "list run aborted");
                    return;
                }
            },
            Job::Details(job) => match poll_details_once(ctx, job).await {
                Ok(report) => Event::DetailsPolled(report),
                Err(err) => {
                    error!(error = %err, "details run aborted");
                    return;
                }
            },
        };
        if events.send(event).await.is_err() {
            debug!("event receiver dropped");
        }
    }
}

async fn job_loop(
    job: Job,
    ctx: PollContext,
    events: mpsc::Sender<Event>,
    run_at_start: bool,
) {
    let span = info_span!("poll", job = job.name());
    async move {
        if run_at_start && !ctx.cancel.is_cancelled() {
            info!("running job once at startup");
            job.run(&ctx, &events).await;
        }

        loop {
            let Some(delay) = job.trigger().delay_after(Utc::now()) else {
                warn!("trigger has no upcoming fire time, stopping job");
                break;
            };
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    info!("poller shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    job.run(&ctx, &events).await;
                }
            }
        }
    }
    .instrument(span)
    .await
}

/// One list run: fetch the list feed and store every record as a stub.
///
/// Transport, status and decode failures end the run with an error. Per
/// record, unparseable entries are skipped, `AlreadyExists` counts as known
/// and `WriteFailed` is logged; any other store error ends the run.
pub async fn poll_list_once(ctx: &PollContext, job: &ListJob) -> Result<ListRunReport, PollError> {
    info!(url = %job.url, count = job.count, "polling news list");
    let body = fetch_body(ctx, &job.url, &[("Count", job.count.to_string())]).await?;
    let records = feed::decode_list(&body)?.items.records;

    let mut report = ListRunReport {
        fetched: records.len(),
        ..Default::default()
    };
    info!(count = records.len(), "polled news list");

    for record in &records {
        if ctx.cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        let article = match feed::normalize(record, &ctx.team_id, false) {
            Ok(article) => article,
            Err(err) => {
                warn!(news_id = %record.news_article_id, error = %err, "skipping unparseable news record");
                report.skipped += 1;
                continue;
            }
        };

        let article_id = article.id.clone();
        match ctx.store.write(article).await {
            Ok(()) => {
                info!(%article_id, news_id = %record.news_article_id, "saved article from news list");
                report.stored += 1;
            }
            Err(StoreError::AlreadyExists { .. }) => {
                debug!(%article_id, "article already stored");
                report.known += 1;
            }
            Err(err @ StoreError::WriteFailed { .. }) => {
                error!(%article_id, error = %err, "could not write article");
                report.failed += 1;
            }
            Err(err) => {
                error!(%article_id, error = %err, "store failure while processing news list");
                return Err(err.into());
            }
        }
    }

    info!(
        stored = report.stored,
        known = report.known,
        skipped = report.skipped,
        failed = report.failed,
        "finished polling news list"
    );
    Ok(report)
}

/// One details run: enrich every pending stub from the detail feed, in turn.
///
/// A failed fetch, decode or normalization skips that id. A write returning
/// `AlreadyExists` or `WriteFailed` is logged and then handled per
/// [`OnWriteError`]. Any other store error ends the run.
pub async fn poll_details_once(
    ctx: &PollContext,
    job: &DetailsJob,
) -> Result<DetailsRunReport, PollError> {
    let ids = ctx.store.pending_details_ids().await?;
    let mut report = DetailsRunReport {
        pending: ids.len(),
        ..Default::default()
    };
    if ids.is_empty() {
        info!("no news waiting for details");
        return Ok(report);
    }
    info!(url = %job.url, pending = ids.len(), "polling news details");

    for news_id in &ids {
        if ctx.cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        let article = match fetch_detail(ctx, job, news_id).await {
            Ok(article) => article,
            Err(PollError::Cancelled) => return Err(PollError::Cancelled),
            Err(err) => {
                warn!(%news_id, error = %err, "could not get news details, skipping");
                report.skipped += 1;
                continue;
            }
        };

        let article_id = article.id.clone();
        match ctx.store.write(article).await {
            Ok(()) => {
                info!(%article_id, %news_id, "saved article from detailed news");
                report.enriched += 1;
            }
            Err(err @ (StoreError::AlreadyExists { .. } | StoreError::WriteFailed { .. })) => {
                if matches!(err, StoreError::AlreadyExists { .. }) {
                    info!(%article_id, %news_id, error = %err, "detailed article not written");
                } else {
                    error!(%article_id, %news_id, error = %err, "could not write detailed article");
                }
                report.rejected += 1;
                if job.on_write_error == OnWriteError::Stop {
                    warn!("stopping details run after write error");
                    report.stopped_early = true;
                    break;
                }
            }
            Err(err) => {
                error!(%article_id, %news_id, error = %err, "store failure while polling details");
                return Err(err.into());
            }
        }
    }

    info!(
        enriched = report.enriched,
        skipped = report.skipped,
        rejected = report.rejected,
        "finished polling news details"
    );
    Ok(report)
}

async fn fetch_detail(ctx: &PollContext, job: &DetailsJob, news_id: &str) -> Result<Article, PollError> {
    let body = fetch_body(ctx, &job.url, &[("id", news_id.to_owned())]).await?;
    let mut detail = feed::decode_detail(&body)?;
    if detail.article.news_article_id.is_empty() {
        detail.article.news_article_id = news_id.to_owned();
    }
    Ok(feed::normalize(&detail.article, &ctx.team_id, true)?)
}

async fn fetch_body(
    ctx: &PollContext,
    url: &str,
    query: &[(&str, String)],
) -> Result<String, PollError> {
    let request = ctx.client.get(url).query(query).send();
    let response = tokio::select! {
        _ = ctx.cancel.cancelled() => return Err(PollError::Cancelled),
        response = request => response?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(PollError::Status(status));
    }

    tokio::select! {
        _ = ctx.cancel.cancelled() => Err(PollError::Cancelled),
        body = response.text() => Ok(body?),
    }
}
