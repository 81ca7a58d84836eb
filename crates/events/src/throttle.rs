//! Per-job throttling and coalescing of progress updates.
//!
//! Workers can report progress far faster than a client needs to redraw
//! a progress bar. [`Throttle::offer`] lets an update through when it is
//! meaningful (terminal status, first update, large percent jump, or
//! enough time since the last send) and otherwise parks it as the job's
//! pending update, replacing any earlier pending one. Pending updates
//! are released by [`Throttle::take_pending`] on the hub's flush tick.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use pictopy_core::progress::ProgressUpdate;
use pictopy_core::types::JobId;

use crate::config::HubConfig;

/// What was last sent for a job.
#[derive(Debug, Clone, Copy)]
struct LastSent {
    percent: Option<f64>,
    at: Instant,
}

#[derive(Debug)]
pub struct Throttle {
    percent_delta: f64,
    min_interval: Duration,
    last_sent: HashMap<JobId, LastSent>,
    pending: HashMap<JobId, ProgressUpdate>,
}

impl Throttle {
    pub fn new(percent_delta: f64, min_interval: Duration) -> Self {
        Self {
            percent_delta,
            min_interval,
            last_sent: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(config.percent_delta, config.min_interval)
    }

    /// Whether `update` should be sent immediately rather than coalesced.
    pub fn should_send_now(&self, update: &ProgressUpdate, now: Instant) -> bool {
        if update.is_terminal() {
            return true;
        }
        let Some(last) = self.last_sent.get(job_key(update)) else {
            return true;
        };
        let Some(percent) = update.percent else {
            return true;
        };
        if (percent - last.percent.unwrap_or(0.0)).abs() >= self.percent_delta {
            return true;
        }
        now.saturating_duration_since(last.at) >= self.min_interval
    }

    /// Offer an update. Returns it back when it should be emitted now
    /// (and records it as sent); otherwise keeps it as the job's pending
    /// update and returns `None`.
    pub fn offer(&mut self, update: ProgressUpdate, now: Instant) -> Option<ProgressUpdate> {
        let key = job_key(&update).to_string();
        if self.should_send_now(&update, now) {
            // A newer update supersedes anything still waiting for a flush.
            self.pending.remove(&key);
            self.record_sent(key, update.percent, now);
            Some(update)
        } else {
            self.pending.insert(key, update);
            None
        }
    }

    /// Drain all pending updates, recording each as sent at `now`.
    pub fn take_pending(&mut self, now: Instant) -> Vec<ProgressUpdate> {
        let drained: Vec<(JobId, ProgressUpdate)> = self.pending.drain().collect();
        drained
            .into_iter()
            .map(|(key, update)| {
                self.record_sent(key, update.percent, now);
                update
            })
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn record_sent(&mut self, key: JobId, percent: Option<f64>, at: Instant) {
        self.last_sent.insert(key, LastSent { percent, at });
    }
}

fn job_key(update: &ProgressUpdate) -> &str {
    update.job_id.as_deref().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> Throttle {
        Throttle::new(1.0, Duration::from_millis(250))
    }

    fn at(percent: f64) -> ProgressUpdate {
        ProgressUpdate::new("job").with_percent(percent)
    }

    #[test]
    fn first_update_for_job_is_sent() {
        let mut t = throttle();
        assert!(t.offer(at(0.2), Instant::now()).is_some());
    }

    #[test]
    fn small_change_within_interval_is_coalesced() {
        let mut t = throttle();
        let now = Instant::now();
        t.offer(at(10.0), now);
        assert!(t.offer(at(10.3), now).is_none());
        assert!(t.offer(at(10.6), now).is_none());
        assert_eq!(t.pending_count(), 1);

        let flushed = t.take_pending(now);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].percent, Some(10.6));
        assert_eq!(t.pending_count(), 0);
    }

    #[test]
    fn percent_jump_is_sent() {
        let mut t = throttle();
        let now = Instant::now();
        t.offer(at(10.0), now);
        assert!(t.offer(at(11.0), now).is_some());
    }

    #[test]
    fn elapsed_interval_is_sent() {
        let mut t = throttle();
        let start = Instant::now();
        t.offer(at(10.0), start);
        assert!(t.offer(at(10.1), start + Duration::from_millis(300)).is_some());
    }

    #[test]
    fn terminal_status_is_never_coalesced() {
        let mut t = throttle();
        let now = Instant::now();
        t.offer(at(99.5), now);
        let done = at(99.6).with_status("done");
        assert!(t.offer(done, now).is_some());
    }

    #[test]
    fn update_without_percent_is_sent() {
        let mut t = throttle();
        let now = Instant::now();
        t.offer(at(10.0), now);
        assert!(t.offer(ProgressUpdate::new("job").with_status("tagging"), now).is_some());
    }

    #[test]
    fn immediate_send_clears_stale_pending_update() {
        let mut t = throttle();
        let now = Instant::now();
        t.offer(at(10.0), now);
        t.offer(at(10.2), now);
        assert_eq!(t.pending_count(), 1);

        t.offer(at(50.0), now);
        assert_eq!(t.pending_count(), 0);
        assert!(t.take_pending(now).is_empty());
    }

    #[test]
    fn jobs_are_throttled_independently() {
        let mut t = throttle();
        let now = Instant::now();
        t.offer(at(10.0), now);
        assert!(t
            .offer(ProgressUpdate::new("other").with_percent(10.1), now)
            .is_some());
    }
}
