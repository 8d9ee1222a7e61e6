mod check;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use news_core::storage;
use news_core::{spawn_poller, ArticleStore, Event, PollConfig, ServiceConfig};
use reqwest::{redirect, Client, ClientBuilder};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sportsnews", version, about = "Polls the club news feed into the article store")]
struct Cli {
    /// Base configuration, read first.
    #[arg(long, default_value = "config/default.json")]
    default_config: PathBuf,

    /// Overrides merged over the base configuration.
    /// Defaults to `<config dir>/sportsnews/config.json`.
    #[arg(long, env = "SPORTSNEWS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the poller until Ctrl-C (default).
    Run,
    /// Exercise the configured store end to end and exit.
    CheckStore,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let custom = cli.config.clone().unwrap_or_else(default_custom_config);

    let config = match ServiceConfig::load(&cli.default_config, Some(&custom)) {
        Ok(config) => config,
        Err(err) => {
            // the subscriber is not installed yet
            eprintln!("sportsnews: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log.filter);

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::CheckStore => check::run(&config).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "sportsnews exited with an error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn default_custom_config() -> PathBuf {
    // Linux: ~/.config/sportsnews/config.json
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("config"));
    path.push("sportsnews");
    path.push("config.json");
    path
}

fn build_client(config: &ServiceConfig) -> anyhow::Result<Client> {
    ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .user_agent(&config.http.user_agent)
        .timeout(Duration::from_secs(config.http.timeout_seconds))
        .build()
        .context("failed to build HTTP client")
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let store = storage::open(config.storage_kind, &config.sqlite_storage)
        .await
        .context("failed to initialise article store")?;
    let client = build_client(&config)?;
    let poll_config = PollConfig::from_service_config(&config)?;

    let (event_tx, event_rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let poller = spawn_poller(store.clone(), poll_config, client, event_tx, cancel.clone());

    let reporter = spawn_reporter(event_rx);

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for shutdown signal")?;
            info!("shutdown signal received");
        }
        _ = cancel.cancelled() => {}
    }

    poller.stop().await.context("poller did not stop cleanly")?;
    // senders are gone once both jobs have ended
    join_reporter(reporter).await;
    store.disconnect().await.context("failed to disconnect article store")?;
    info!("stopped");
    Ok(())
}

fn spawn_reporter(mut events: mpsc::Receiver<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                Event::ListPolled(report) => info!(?report, "list run complete"),
                Event::DetailsPolled(report) => info!(?report, "details run complete"),
            }
        }
    })
}

/// Waits for the reporter to drain; returns `false` if it panicked or was aborted.
async fn join_reporter(reporter: JoinHandle<()>) -> bool {
    match reporter.await {
        Ok(()) => true,
        Err(err) => {
            error!(error = %err, "event reporter task failed");
            false
        }
    }
}
