use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use pictopy_core::progress::{ProgressMessage, ServerMessage};
use pictopy_core::types::Seq;
use pictopy_events::ProgressHub;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::query::SinceParams;
use crate::state::AppState;
use crate::ws::manager::WsManager;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// `?since=<seq>` asks for every buffered event after `seq` before the
/// live stream starts; without it the whole replay buffer is sent.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<SinceParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.since))
}

/// Manage a single WebSocket connection after upgrade.
///
/// 1. Subscribes to the hub, then reads the replay buffer, so no event
///    can fall between the two. `since` filters only the replay; live
///    events are deduplicated against what this socket actually sent.
/// 2. Registers the connection with `WsManager`.
/// 3. Spawns a sender task (channel -> sink) and a forwarder task
///    (replay, then live events, skipping anything already sent).
/// 4. Reads inbound frames until the client goes away, then cleans up.
async fn handle_socket(socket: WebSocket, state: AppState, since: Option<Seq>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, ?since, "WebSocket connected");

    let live = state.hub.subscribe();
    // Read before the replay: anything emitted later is either in the
    // replay or has a higher seq.
    let floor = state.hub.stats().await.last_seq;
    let replay = state.hub.events_since(since).await;

    let mut rx = state.ws_manager.add(conn_id.clone(), since).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    let forward_task = tokio::spawn(forward_progress(
        conn_id.clone(),
        floor,
        replay,
        live,
        Arc::clone(&state.hub),
        Arc::clone(&state.ws_manager),
    ));

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_msg) => {
                // The progress stream is server-to-client only.
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    forward_task.abort();
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Send the replay batch, then every live event newer than both the last
/// one sent and `floor` (the hub's last seq when the replay was read).
/// A lagging subscription is caught up from the replay buffer.
///
/// The client's requested resume point plays no part here: after a
/// server restart it can be far ahead of the hub's numbering.
async fn forward_progress(
    conn_id: String,
    floor: Seq,
    replay: Vec<ProgressMessage>,
    mut live: broadcast::Receiver<ProgressMessage>,
    hub: Arc<ProgressHub>,
    ws_manager: Arc<WsManager>,
) {
    let mut last_sent = None;

    if !send_batch(&conn_id, replay, &mut last_sent, &ws_manager).await {
        return;
    }
    last_sent = last_sent.max(Some(floor));

    loop {
        match live.recv().await {
            Ok(message) => {
                if !send_batch(&conn_id, vec![message], &mut last_sent, &ws_manager).await {
                    return;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    conn_id = %conn_id,
                    skipped,
                    ?last_sent,
                    "Progress subscriber lagged, catching up from replay buffer",
                );
                let missed = hub.events_since(last_sent).await;
                if !send_batch(&conn_id, missed, &mut last_sent, &ws_manager).await {
                    return;
                }
            }
            Err(RecvError::Closed) => return,
        }
    }
}

/// Send events newer than `last_sent`, advancing it. Returns `false` once
/// the connection is gone.
async fn send_batch(
    conn_id: &str,
    events: Vec<ProgressMessage>,
    last_sent: &mut Option<Seq>,
    ws_manager: &WsManager,
) -> bool {
    for event in events {
        if !is_newer(&event, *last_sent) {
            continue;
        }
        let text = match serde_json::to_string(&ServerMessage::Progress(event.clone())) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(conn_id, error = %e, "Failed to serialize progress event");
                continue;
            }
        };
        if !ws_manager.send_to(conn_id, Message::Text(text.into())).await {
            return false;
        }
        if event.seq.is_some() {
            *last_sent = event.seq;
        }
    }
    true
}

fn is_newer(event: &ProgressMessage, last_sent: Option<Seq>) -> bool {
    match (event.seq, last_sent) {
        (Some(seq), Some(last)) => seq > last,
        _ => true,
    }
}
