//! `pictopy-watch` -- follow background job progress from the terminal.
//!
//! Connects to the PictoPy progress server over WebSocket and logs every
//! accepted job update. Reconnects with backoff and resumes from the
//! last sequence number seen.
//!
//! # Environment variables
//!
//! | Variable                   | Required | Default | Description                                    |
//! |----------------------------|----------|---------|------------------------------------------------|
//! | `PROGRESS_WS_URL`          | yes      | --      | WebSocket endpoint, e.g. `ws://host:3000/ws`   |
//! | `RECONNECT_INITIAL_MS`     | no       | `1000`  | Delay before the first reconnect attempt       |
//! | `RECONNECT_MAX_MS`         | no       | `30000` | Upper bound on the reconnect delay             |

use std::time::Duration;

use anyhow::Context;
use pictopy_client::client::ProgressClient;
use pictopy_client::events::WatchEvent;
use pictopy_client::reconnect::ReconnectConfig;
use pictopy_client::watcher::ProgressWatcher;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pictopy_client=info,pictopy_watch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ws_url =
        std::env::var("PROGRESS_WS_URL").context("PROGRESS_WS_URL environment variable is required")?;
    let reconnect = reconnect_config_from_env()?;

    tracing::info!(ws_url = %ws_url, "Starting pictopy-watch");

    let watcher = ProgressWatcher::start(ProgressClient::new(ws_url), reconnect);
    let mut events = watcher.session().subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, stopping");
                break;
            }
            event = events.recv() => match event {
                Ok(WatchEvent::Connected { since }) => {
                    tracing::info!(?since, "Connected");
                }
                Ok(WatchEvent::Disconnected) => {
                    tracing::warn!("Disconnected");
                }
                Ok(WatchEvent::JobUpdated(job)) => {
                    tracing::info!(
                        job_id = %job.job_id,
                        percent = ?job.percent,
                        processed = ?job.processed,
                        total = ?job.total,
                        status = job.status.as_deref().unwrap_or("-"),
                        "Job progress",
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event reader lagged behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    watcher.shutdown().await;
    for job in watcher.session().snapshot().await {
        tracing::info!(job_id = %job.job_id, percent = ?job.percent, status = ?job.status, "Final state");
    }
    Ok(())
}

fn reconnect_config_from_env() -> anyhow::Result<ReconnectConfig> {
    let mut config = ReconnectConfig::default();
    if let Ok(raw) = std::env::var("RECONNECT_INITIAL_MS") {
        let ms: u64 = raw.parse().context("RECONNECT_INITIAL_MS must be a valid u64")?;
        config.initial_delay = Duration::from_millis(ms);
    }
    if let Ok(raw) = std::env::var("RECONNECT_MAX_MS") {
        let ms: u64 = raw.parse().context("RECONNECT_MAX_MS must be a valid u64")?;
        config.max_delay = Duration::from_millis(ms);
    }
    Ok(config)
}
