use std::sync::Arc;

use pictopy_events::ProgressHub;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (progress subscribers).
    pub ws_manager: Arc<WsManager>,
    /// Progress hub: seq stamping, coalescing, replay.
    pub hub: Arc<ProgressHub>,
}
