//! Session-owned progress state.
//!
//! [`ProgressSession`] is the single owner of a connection's job map and
//! ordering watermarks. It is shared by reference between the message
//! processor (the only writer) and presentation code (readers only).

use std::sync::atomic::{AtomicU64, Ordering};

use pictopy_core::progress::ProgressMessage;
use pictopy_core::reconcile::{Job, ProgressReconciler, ReconcileOutcome};
use pictopy_core::types::Seq;
use tokio::sync::{broadcast, RwLock};

use crate::events::WatchEvent;

/// Broadcast channel capacity for session events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct ProgressSession {
    reconciler: RwLock<ProgressReconciler>,
    /// Highest seq observed plus one; zero means nothing observed yet.
    resume_mark: AtomicU64,
    event_tx: broadcast::Sender<WatchEvent>,
}

impl ProgressSession {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            reconciler: RwLock::new(ProgressReconciler::new()),
            resume_mark: AtomicU64::new(0),
            event_tx,
        }
    }

    /// Subscribe to connection changes and accepted job updates.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.event_tx.subscribe()
    }

    /// Reconcile one inbound progress message.
    ///
    /// The read-compare-write of the watermark happens under one write
    /// lock. Accepted updates are broadcast as [`WatchEvent::JobUpdated`].
    pub async fn apply(&self, message: &ProgressMessage) -> ReconcileOutcome {
        if let Some(seq) = message.seq {
            self.resume_mark
                .fetch_max(seq.saturating_add(1), Ordering::SeqCst);
        }

        let (outcome, job) = {
            let mut reconciler = self.reconciler.write().await;
            let outcome = reconciler.apply(message);
            let job = if outcome.is_applied() {
                message
                    .payload
                    .job_id()
                    .and_then(|id| reconciler.job(id))
                    .cloned()
            } else {
                None
            };
            (outcome, job)
        };

        if let Some(job) = job {
            tracing::debug!(
                job_id = %job.job_id,
                seq = ?job.seq,
                percent = ?job.percent,
                status = ?job.status,
                "Job progress updated",
            );
            self.notify(WatchEvent::JobUpdated(job));
        }
        outcome
    }

    /// Highest sequence number seen on the wire, used to resume after
    /// a reconnect.
    pub fn resume_point(&self) -> Option<Seq> {
        match self.resume_mark.load(Ordering::SeqCst) {
            0 => None,
            mark => Some(mark - 1),
        }
    }

    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.reconciler.read().await.job(job_id).cloned()
    }

    /// All known jobs ordered by id.
    pub async fn snapshot(&self) -> Vec<Job> {
        self.reconciler.read().await.snapshot()
    }

    pub(crate) fn notify(&self, event: WatchEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

impl Default for ProgressSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pictopy_core::progress::ProgressUpdate;

    use super::*;

    fn message(job: &str, seq: Option<Seq>, percent: f64) -> ProgressMessage {
        ProgressMessage {
            seq,
            ts: Some(1_000),
            payload: ProgressUpdate::new(job).with_percent(percent),
        }
    }

    #[tokio::test]
    async fn accepted_update_is_broadcast() {
        let session = ProgressSession::new();
        let mut rx = session.subscribe();

        let outcome = session.apply(&message("scan", Some(1), 10.0)).await;
        assert_eq!(outcome, ReconcileOutcome::Applied);

        assert_matches!(rx.try_recv(), Ok(WatchEvent::JobUpdated(job)) => {
            assert_eq!(job.job_id, "scan");
            assert_eq!(job.percent, Some(10.0));
        });
    }

    #[tokio::test]
    async fn stale_update_is_not_broadcast() {
        let session = ProgressSession::new();
        session.apply(&message("scan", Some(5), 50.0)).await;
        let mut rx = session.subscribe();

        let outcome = session.apply(&message("scan", Some(4), 40.0)).await;
        assert_eq!(outcome, ReconcileOutcome::Stale);
        assert!(rx.try_recv().is_err());
        assert_eq!(session.job("scan").await.unwrap().percent, Some(50.0));
    }

    #[tokio::test]
    async fn resume_point_tracks_highest_seq_seen() {
        let session = ProgressSession::new();
        assert_eq!(session.resume_point(), None);

        session.apply(&message("a", Some(3), 1.0)).await;
        session.apply(&message("b", Some(9), 1.0)).await;
        session.apply(&message("a", Some(2), 1.0)).await;
        session.apply(&message("c", None, 1.0)).await;

        assert_eq!(session.resume_point(), Some(9));
    }

    #[tokio::test]
    async fn seq_zero_still_sets_resume_point() {
        let session = ProgressSession::new();
        session.apply(&message("a", Some(0), 1.0)).await;
        assert_eq!(session.resume_point(), Some(0));
    }

    #[tokio::test]
    async fn snapshot_lists_jobs_in_id_order() {
        let session = ProgressSession::new();
        session.apply(&message("b", Some(1), 1.0)).await;
        session.apply(&message("a", Some(2), 1.0)).await;

        let ids: Vec<_> = session
            .snapshot()
            .await
            .into_iter()
            .map(|job| job.job_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
