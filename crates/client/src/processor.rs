//! WebSocket message processing loop.
//!
//! Reads raw frames from a progress connection, parses them into typed
//! [`ServerMessage`] variants, and feeds progress events to the
//! [`ProgressSession`].

use futures::{Stream, StreamExt};
use pictopy_core::progress::{parse_server_message, ServerMessage};
use pictopy_core::reconcile::ReconcileOutcome;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::session::ProgressSession;

/// Counters for one processed connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStats {
    pub applied: u64,
    pub stale: u64,
    pub dropped: u64,
    pub unparsed: u64,
}

/// Process frames until the WebSocket closes, errors, or is exhausted.
///
/// Binary frames are ignored. Unparseable text frames are logged and
/// skipped.
pub async fn process_messages<S>(stream: &mut S, session: &ProgressSession) -> ProcessStats
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let mut stats = ProcessStats::default();

    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                handle_text_message(&text, session, &mut stats).await;
            }
            Ok(Message::Binary(_)) => {
                tracing::trace!("Ignoring binary message");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Progress WebSocket closed");
                break;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    tracing::debug!(
        applied = stats.applied,
        stale = stats.stale,
        dropped = stats.dropped,
        unparsed = stats.unparsed,
        "Progress stream ended",
    );
    stats
}

async fn handle_text_message(text: &str, session: &ProgressSession, stats: &mut ProcessStats) {
    match parse_server_message(text) {
        Ok(ServerMessage::Progress(message)) => match session.apply(&message).await {
            ReconcileOutcome::Applied => stats.applied += 1,
            ReconcileOutcome::Stale => stats.stale += 1,
            ReconcileOutcome::MissingJobId => stats.dropped += 1,
        },
        Err(e) => {
            stats.unparsed += 1;
            tracing::warn!(
                error = %e,
                raw_message = %text,
                "Failed to parse progress message",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn text(s: &str) -> Result<Message, WsError> {
        Ok(Message::Text(s.to_string()))
    }

    #[tokio::test]
    async fn reordered_frames_keep_newest_state() {
        let session = ProgressSession::new();
        let mut frames = stream::iter(vec![
            text(r#"{"type":"progress","seq":1,"ts":10,"payload":{"job_id":"a","percent":10}}"#),
            text(r#"{"type":"progress","seq":3,"ts":30,"payload":{"job_id":"a","percent":30}}"#),
            text(r#"{"type":"progress","seq":2,"ts":20,"payload":{"job_id":"a","percent":20}}"#),
        ]);

        let stats = process_messages(&mut frames, &session).await;

        assert_eq!(stats.applied, 2);
        assert_eq!(stats.stale, 1);
        assert_eq!(session.job("a").await.unwrap().percent, Some(30.0));
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let session = ProgressSession::new();
        let mut frames = stream::iter(vec![
            text("not json"),
            text(r#"{"type":"mystery"}"#),
            text(r#"{"type":"progress","seq":1,"payload":{"percent":5}}"#),
            Ok(Message::Binary(vec![1, 2, 3])),
            text(r#"{"type":"progress","seq":2,"ts":5,"payload":{"job_id":"b","status":"running"}}"#),
        ]);

        let stats = process_messages(&mut frames, &session).await;

        assert_eq!(stats.unparsed, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(
            session.job("b").await.unwrap().status.as_deref(),
            Some("running")
        );
    }

    #[tokio::test]
    async fn close_frame_stops_processing() {
        let session = ProgressSession::new();
        let mut frames = stream::iter(vec![
            Ok(Message::Close(None)),
            text(r#"{"type":"progress","seq":1,"payload":{"job_id":"a","percent":5}}"#),
        ]);

        let stats = process_messages(&mut frames, &session).await;

        assert_eq!(stats, ProcessStats::default());
        assert!(session.job("a").await.is_none());
    }

    #[tokio::test]
    async fn receive_error_stops_processing() {
        let session = ProgressSession::new();
        let mut frames = stream::iter(vec![
            Err(WsError::ConnectionClosed),
            text(r#"{"type":"progress","seq":1,"payload":{"job_id":"a","percent":5}}"#),
        ]);

        process_messages(&mut frames, &session).await;
        assert!(session.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn replayed_duplicates_after_reconnect_are_rejected() {
        let session = ProgressSession::new();
        let first = r#"{"type":"progress","seq":4,"ts":40,"payload":{"job_id":"a","percent":40}}"#;
        let mut before = stream::iter(vec![text(first)]);
        process_messages(&mut before, &session).await;

        // Server replays from an older resume point; seq 4 arrives again.
        let mut after = stream::iter(vec![
            text(first),
            text(r#"{"type":"progress","seq":5,"ts":50,"payload":{"job_id":"a","percent":50}}"#),
        ]);
        let stats = process_messages(&mut after, &session).await;

        assert_eq!(stats.stale, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(session.resume_point(), Some(5));
    }
}
