//! Progress message types and parser.
//!
//! The hub sends JSON messages over WebSocket with the shape
//! `{"type": "progress", "seq": 7, "ts": 1700000000000, "payload": {...}}`.
//! This module (de)serializes them into a strongly-typed
//! [`ServerMessage`] enum.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::types::{EpochMillis, Seq};

/// Wire value of the `type` field for progress messages.
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// Job finished successfully.
pub const STATUS_DONE: &str = "done";

/// Job failed.
pub const STATUS_FAILED: &str = "failed";

/// Job was cancelled.
pub const STATUS_CANCELLED: &str = "cancelled";

/// Returns `true` for status labels after which no further progress is expected.
pub fn is_terminal_status(status: &str) -> bool {
    matches!(status, STATUS_DONE | STATUS_FAILED | STATUS_CANCELLED)
}

/// All known server-to-client message types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Progress of a single background job.
    #[serde(rename = "progress")]
    Progress(ProgressMessage),
}

/// A progress event as delivered to clients.
///
/// `seq` and `ts` are optional on the inbound side: older producers
/// omit the sequence number, and a missing timestamp is replaced with
/// the arrival time by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<Seq>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<EpochMillis>,
    #[serde(default)]
    pub payload: ProgressUpdate,
}

/// Partial job fields carried by one progress event.
///
/// Absent fields mean "not provided" and leave the previously known
/// value untouched when merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Item counts. Fractional values are truncated; negative or
    /// non-numeric values are treated as absent.
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub processed: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<u64>,
    /// Completion percentage (0-100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ProgressUpdate {
    /// Create an update for `job_id` with no fields set.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..Default::default()
        }
    }

    pub fn with_percent(mut self, percent: f64) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn with_counts(mut self, processed: u64, total: u64) -> Self {
        self.processed = Some(processed);
        self.total = Some(total);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// The job id, if present and non-empty.
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether this update carries a terminal status label.
    pub fn is_terminal(&self) -> bool {
        self.status.as_deref().is_some_and(is_terminal_status)
    }

    /// Check an update submitted by a producer before it is published.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.job_id().is_none() {
            return Err(CoreError::Validation("job_id must not be empty".into()));
        }
        if let Some(percent) = self.percent {
            if !(0.0..=100.0).contains(&percent) {
                return Err(CoreError::Validation(format!(
                    "percent must be between 0 and 100, got {percent}"
                )));
            }
        }
        if let (Some(processed), Some(total)) = (self.processed, self.total) {
            if processed > total {
                return Err(CoreError::Validation(format!(
                    "processed ({processed}) exceeds total ({total})"
                )));
            }
        }
        Ok(())
    }
}

/// Read a count without failing the whole message over its number format.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
        }),
        _ => None,
    })
}

/// Parse a server text frame into a typed message.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers should log and continue.
pub fn parse_server_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}
