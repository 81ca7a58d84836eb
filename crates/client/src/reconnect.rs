//! Exponential-backoff reconnection for the progress WebSocket.
//!
//! When the connection drops, the watcher calls [`reconnect_loop`] to
//! keep retrying with increasing delays until either the connection is
//! restored or the [`CancellationToken`] is triggered.

use std::time::Duration;

use pictopy_core::types::Seq;
use tokio_util::sync::CancellationToken;

use crate::client::{ProgressClient, ProgressConnection};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Reconnect with exponential backoff.
///
/// `resume_from` is re-evaluated before every attempt so the newest
/// resume point is used. Returns `None` if `cancel` fires first.
pub async fn reconnect_loop<F>(
    client: &ProgressClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
    resume_from: F,
) -> Option<ProgressConnection>
where
    F: Fn() -> Option<Seq>,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        // Wait before the attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(
            url = client.ws_url(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to progress server",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
            result = client.connect(resume_from()) => {
                match result {
                    Ok(conn) => {
                        tracing::info!(attempt, "Reconnected to progress server");
                        return Some(conn);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Reconnect attempt {attempt} failed");
                    }
                }
            }
        }

        delay = next_delay(delay, config);
    }
}
