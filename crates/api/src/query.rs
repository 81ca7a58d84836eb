//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Resume point for replay (`?since=`).
///
/// Used by the WebSocket upgrade and the replay listing. When absent,
/// every buffered event is returned.
#[derive(Debug, Default, Deserialize)]
pub struct SinceParams {
    pub since: Option<u64>,
}
