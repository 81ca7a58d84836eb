//! PictoPy progress domain.
//!
//! Shared types for background-job progress reporting: the wire message
//! shape exchanged over WebSocket, the job record shown to users, and the
//! reconciler that merges out-of-order progress events into a job map.

pub mod error;
pub mod progress;
pub mod reconcile;
pub mod types;
