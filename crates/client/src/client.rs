//! WebSocket client for the progress server.
//!
//! [`ProgressClient`] holds the endpoint configuration. Call
//! [`ProgressClient::connect`] to open a live [`ProgressConnection`],
//! optionally resuming after a known sequence number so the server
//! replays anything missed while disconnected.

use pictopy_core::types::Seq;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Raw WebSocket stream type used by the client.
pub type ProgressStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for one progress server endpoint.
#[derive(Debug, Clone)]
pub struct ProgressClient {
    ws_url: String,
}

/// A live WebSocket connection to the progress server.
pub struct ProgressConnection {
    /// The resume point sent during the handshake, if any.
    pub since: Option<Seq>,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: ProgressStream,
}

impl ProgressClient {
    /// Create a client for `ws_url`, e.g. `ws://localhost:3000/ws`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Build the handshake URL, appending `since` when resuming.
    pub fn url_for(&self, since: Option<Seq>) -> String {
        match since {
            None => self.ws_url.clone(),
            Some(seq) => {
                let separator = if self.ws_url.contains('?') { '&' } else { '?' };
                format!("{}{separator}since={seq}", self.ws_url)
            }
        }
    }

    /// Connect to the progress WebSocket endpoint.
    pub async fn connect(&self, since: Option<Seq>) -> Result<ProgressConnection, ClientError> {
        let url = self.url_for(since);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ClientError::Connection(format!(
                "Failed to connect to progress server at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(url = %url, ?since, "Connected to progress server");

        Ok(ProgressConnection { since, ws_stream })
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
