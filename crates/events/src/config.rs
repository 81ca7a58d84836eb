use std::time::Duration;

/// Tunable parameters for the progress hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Number of emitted events kept for replay.
    pub recent_max: usize,
    /// Capacity of the inbound update queue. Updates beyond it are dropped.
    pub queue_capacity: usize,
    /// Capacity of the outbound broadcast channel.
    pub broadcast_capacity: usize,
    /// Percent change that forces an immediate send.
    pub percent_delta: f64,
    /// Minimum time between sends for the same job.
    pub min_interval: Duration,
    /// How often coalesced updates are flushed.
    pub flush_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            recent_max: 1000,
            queue_capacity: 1024,
            broadcast_capacity: 1024,
            percent_delta: 1.0,
            min_interval: Duration::from_millis(250),
            flush_interval: Duration::from_millis(500),
        }
    }
}
