//! PictoPy progress client.
//!
//! Connects to the progress server over WebSocket, reconciles inbound
//! progress events into a session-owned job map, and reconnects with
//! exponential backoff, resuming from the last sequence number seen.

pub mod client;
pub mod events;
pub mod processor;
pub mod reconnect;
pub mod session;
pub mod watcher;
