//! WebSocket infrastructure for progress streaming.
//!
//! Provides connection management, heartbeat pings, and the HTTP
//! upgrade handler that replays buffered events before going live.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
