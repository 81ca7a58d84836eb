/// Jobs are keyed by the opaque string id assigned by the producer.
pub type JobId = String;

/// Monotonic sequence number stamped by the progress hub.
pub type Seq = u64;

/// Milliseconds since the Unix epoch (UTC).
pub type EpochMillis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    chrono::Utc::now().timestamp_millis()
}
