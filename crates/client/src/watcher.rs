//! Long-lived progress connection.
//!
//! [`ProgressWatcher`] spawns a task that connects to the progress
//! server, processes messages into a [`ProgressSession`], and reconnects
//! with backoff when the connection drops. Each reconnect resumes from
//! the session's last seen sequence number.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::ProgressClient;
use crate::events::WatchEvent;
use crate::processor::process_messages;
use crate::reconnect::{reconnect_loop, ReconnectConfig};
use crate::session::ProgressSession;

/// How long [`ProgressWatcher::shutdown`] waits for the task to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ProgressWatcher {
    session: Arc<ProgressSession>,
    task_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl ProgressWatcher {
    /// Spawn the connection task for `client`.
    pub fn start(client: ProgressClient, reconnect: ReconnectConfig) -> Arc<Self> {
        let session = Arc::new(ProgressSession::new());
        let cancel = CancellationToken::new();

        let task_session = Arc::clone(&session);
        let task_cancel = cancel.clone();
        let task_handle = tokio::spawn(async move {
            tracing::info!(url = client.ws_url(), "Starting progress connection task");
            run_connection_loop(&client, &reconnect, &task_session, &task_cancel).await;
            tracing::info!("Progress connection task exited");
        });

        Arc::new(Self {
            session,
            task_handle: Mutex::new(Some(task_handle)),
            cancel,
        })
    }

    /// The session this watcher feeds.
    pub fn session(&self) -> &Arc<ProgressSession> {
        &self.session
    }

    /// Cancel the connection task and wait for it to finish.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down progress watcher");
        self.cancel.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Progress connection task did not stop in time");
            }
        }
    }
}

/// Core connection loop: connect -> process messages -> reconnect.
///
/// Runs until the cancellation token is triggered.
pub async fn run_connection_loop(
    client: &ProgressClient,
    reconnect: &ReconnectConfig,
    session: &ProgressSession,
    cancel: &CancellationToken,
) {
    let first = tokio::select! {
        _ = cancel.cancelled() => return,
        result = client.connect(session.resume_point()) => result,
    };

    let mut conn = match first {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "Connection failed, entering reconnect loop");
            match reconnect_loop(client, reconnect, cancel, || session.resume_point()).await {
                Some(conn) => conn,
                None => return,
            }
        }
    };

    loop {
        session.notify(WatchEvent::Connected { since: conn.since });

        let mut ws_stream = conn.ws_stream;
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = process_messages(&mut ws_stream, session) => false,
        };
        if cancelled {
            let _ = ws_stream.close(None).await;
        }

        session.notify(WatchEvent::Disconnected);

        if cancel.is_cancelled() {
            return;
        }

        tracing::info!(
            resume_point = ?session.resume_point(),
            "Connection lost, entering reconnect loop",
        );
        conn = match reconnect_loop(client, reconnect, cancel, || session.resume_point()).await {
            Some(conn) => conn,
            None => return,
        };
    }
}
