//! Out-of-order progress reconciliation.
//!
//! Progress events for the same job can reach a client out of order:
//! concurrent delivery paths, retries, and replay after a reconnect all
//! reorder or duplicate them. [`reconcile`] applies an event only when it
//! is newer than the job's recorded watermark and merges its partial
//! fields into the job map.
//!
//! Ordering rules, evaluated per job id:
//!
//! 1. incoming and stored both carry a `seq`: accept iff incoming is
//!    strictly greater;
//! 2. incoming carries a `seq`, stored does not: accept (bootstrap);
//! 3. incoming has no `seq`: accept iff its `ts` is strictly greater
//!    than the stored `ts`.
//!
//! Rejected events are dropped without error. Sequence resets (a
//! producer restarting its numbering) are not detected; events after a
//! reset are rejected until the new numbering passes the old watermark.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::progress::{ProgressMessage, ProgressUpdate};
use crate::types::{now_millis, EpochMillis, JobId, Seq};

/// Ordering watermark recorded for one job.
///
/// A job with no recorded watermark behaves as `Watermark::default()`
/// (`seq: None, ts: 0`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub seq: Option<Seq>,
    pub ts: EpochMillis,
}

impl Watermark {
    /// Whether an event stamped `(seq, ts)` is newer than this watermark.
    pub fn admits(&self, seq: Option<Seq>, ts: EpochMillis) -> bool {
        match (seq, self.seq) {
            (Some(incoming), Some(stored)) => incoming > stored,
            (Some(_), None) => true,
            (None, _) => ts > self.ts,
        }
    }
}

/// Latest known state of one job, as shown to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub percent: Option<f64>,
    pub processed: Option<u64>,
    pub total: Option<u64>,
    pub status: Option<String>,
    /// Sequence number of the last accepted event.
    pub seq: Option<Seq>,
    /// Timestamp of the last accepted event.
    pub ts: EpochMillis,
}

impl Job {
    fn empty(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            percent: None,
            processed: None,
            total: None,
            status: None,
            seq: None,
            ts: 0,
        }
    }

    /// Shallow merge: every field present in `payload` overwrites, absent
    /// fields keep their previous value.
    fn merge(&mut self, payload: &ProgressUpdate, seq: Option<Seq>, ts: EpochMillis) {
        if let Some(percent) = payload.percent {
            self.percent = Some(percent);
        }
        if let Some(processed) = payload.processed {
            self.processed = Some(processed);
        }
        if let Some(total) = payload.total {
            self.total = Some(total);
        }
        if let Some(status) = &payload.status {
            self.status = Some(status.clone());
        }
        self.seq = seq;
        self.ts = ts;
    }
}

/// Ordering watermarks keyed by job id.
pub type MetaStore = HashMap<JobId, Watermark>;

/// Displayed job state keyed by job id.
pub type JobMap = HashMap<JobId, Job>;

/// Result of offering one event to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The event was newer and has been merged.
    Applied,
    /// The event was not newer than the recorded watermark and was dropped.
    Stale,
    /// The event had no usable job id and was dropped.
    MissingJobId,
}

impl ReconcileOutcome {
    pub fn is_applied(self) -> bool {
        self == ReconcileOutcome::Applied
    }
}

/// Apply `message` to `meta` and `jobs` if it is newer than the job's
/// watermark.
///
/// `now_ms` is the arrival time, used as the event timestamp when the
/// message carries none.
pub fn reconcile(
    message: &ProgressMessage,
    now_ms: EpochMillis,
    meta: &mut MetaStore,
    jobs: &mut JobMap,
) -> ReconcileOutcome {
    let Some(job_id) = message.payload.job_id() else {
        tracing::debug!(seq = ?message.seq, "Dropping progress event without job id");
        return ReconcileOutcome::MissingJobId;
    };

    let seq = message.seq;
    let ts = message.ts.unwrap_or(now_ms);

    let existing = meta.get(job_id).copied().unwrap_or_default();
    if !existing.admits(seq, ts) {
        tracing::trace!(
            job_id,
            ?seq,
            ts,
            stored_seq = ?existing.seq,
            stored_ts = existing.ts,
            "Dropping stale progress event",
        );
        return ReconcileOutcome::Stale;
    }

    meta.insert(job_id.to_string(), Watermark { seq, ts });
    jobs.entry(job_id.to_string())
        .or_insert_with(|| Job::empty(job_id))
        .merge(&message.payload, seq, ts);

    ReconcileOutcome::Applied
}

/// Owns a job map and its watermarks.
///
/// One reconciler belongs to one connection or session; it is never
/// shared process-wide. Wrap it in a lock if events arrive from more
/// than one task.
#[derive(Debug, Default)]
pub struct ProgressReconciler {
    meta: MetaStore,
    jobs: JobMap,
}

impl ProgressReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a message using the current wall clock as arrival time.
    pub fn apply(&mut self, message: &ProgressMessage) -> ReconcileOutcome {
        self.apply_at(message, now_millis())
    }

    /// Apply a message with an explicit arrival time.
    pub fn apply_at(&mut self, message: &ProgressMessage, now_ms: EpochMillis) -> ReconcileOutcome {
        reconcile(message, now_ms, &mut self.meta, &mut self.jobs)
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.get(job_id)
    }

    pub fn jobs(&self) -> &JobMap {
        &self.jobs
    }

    pub fn watermark(&self, job_id: &str) -> Option<Watermark> {
        self.meta.get(job_id).copied()
    }

    /// All jobs, ordered by job id.
    pub fn snapshot(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
