//! Events emitted by a progress session to passive readers.
//!
//! Presentation code subscribes to these instead of polling the job map.

use pictopy_core::reconcile::Job;
use serde::Serialize;

/// A change observed by a [`ProgressSession`](crate::session::ProgressSession).
#[derive(Debug, Clone, Serialize)]
pub enum WatchEvent {
    /// The WebSocket connection to the server was established.
    Connected {
        /// Resume point sent with the handshake.
        since: Option<u64>,
    },

    /// The WebSocket connection was lost.
    Disconnected,

    /// An accepted progress event changed a job. Carries the merged state.
    JobUpdated(Job),
}
