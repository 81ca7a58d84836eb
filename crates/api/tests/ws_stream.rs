//! End-to-end tests for `GET /ws`: a real server on a local port and the
//! `pictopy-client` watcher on the other side.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::StreamExt;
use pictopy_api::state::AppState;
use pictopy_client::client::ProgressClient;
use pictopy_client::events::WatchEvent;
use pictopy_client::reconnect::ReconnectConfig;
use pictopy_client::session::ProgressSession;
use pictopy_client::watcher::ProgressWatcher;
use pictopy_core::progress::{parse_server_message, ProgressUpdate, ServerMessage};
use pictopy_core::reconcile::Job;

async fn spawn_server() -> (SocketAddr, AppState) {
    let (app, state) = common::build_test_app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn watch(addr: SocketAddr) -> Arc<ProgressWatcher> {
    ProgressWatcher::start(
        ProgressClient::new(format!("ws://{addr}/ws")),
        ReconnectConfig {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
        },
    )
}

async fn wait_for_job<F>(session: &ProgressSession, job_id: &str, done: F) -> Job
where
    F: Fn(&Job) -> bool,
{
    common::eventually(|| async { session.job(job_id).await.filter(|job| done(job)) }).await
}

#[tokio::test]
async fn late_subscriber_receives_replay_then_live_events() {
    let (addr, state) = spawn_server().await;

    state.hub.publish(ProgressUpdate::new("a").with_percent(10.0)).unwrap();
    state
        .hub
        .publish(ProgressUpdate::new("b").with_counts(3, 3).with_status("done"))
        .unwrap();
    common::eventually(|| async { (state.hub.stats().await.last_seq == 2).then_some(()) }).await;

    let watcher = watch(addr);
    let session = Arc::clone(watcher.session());

    // Replayed from the buffer.
    let a = wait_for_job(&session, "a", |job| job.percent == Some(10.0)).await;
    assert_eq!(a.seq, Some(1));
    let b = wait_for_job(&session, "b", |job| job.status.as_deref() == Some("done")).await;
    assert_eq!(b.processed, Some(3));

    // Live: a terminal update is sent immediately.
    state
        .hub
        .publish(ProgressUpdate::new("a").with_percent(100.0).with_status("done"))
        .unwrap();
    let a = wait_for_job(&session, "a", |job| job.status.as_deref() == Some("done")).await;
    assert_eq!(a.percent, Some(100.0));
    assert_eq!(a.seq, Some(3));
    assert_eq!(session.resume_point(), Some(3));

    watcher.shutdown().await;
}

#[tokio::test]
async fn server_tracks_subscriber_and_its_resume_point() {
    let (addr, state) = spawn_server().await;

    let watcher = watch(addr);

    common::eventually(|| async { (state.ws_manager.connection_count().await == 1).then_some(()) })
        .await;
    let info = state.ws_manager.connection_info().await;
    assert_eq!(info[0].since, None);

    watcher.shutdown().await;

    common::eventually(|| async { (state.ws_manager.connection_count().await == 0).then_some(()) })
        .await;
}

#[tokio::test]
async fn reconnect_resumes_without_reapplying_old_events() {
    let (addr, state) = spawn_server().await;

    let watcher = watch(addr);
    let session = Arc::clone(watcher.session());
    let mut events = session.subscribe();

    state.hub.publish(ProgressUpdate::new("a").with_percent(40.0)).unwrap();
    wait_for_job(&session, "a", |job| job.percent == Some(40.0)).await;

    // Kick every subscriber; the watcher reconnects with ?since=1.
    state.ws_manager.shutdown_all().await;
    let reconnected = loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        // Skip the initial connect if it raced with subscribe().
        if matches!(event, WatchEvent::Connected { since: Some(_) }) {
            break event;
        }
    };
    assert_matches!(reconnected, WatchEvent::Connected { since: Some(1) });

    state
        .hub
        .publish(ProgressUpdate::new("a").with_status("failed"))
        .unwrap();
    let a = wait_for_job(&session, "a", |job| job.status.as_deref() == Some("failed")).await;
    assert_eq!(a.percent, Some(40.0));
    assert_eq!(a.seq, Some(2));

    watcher.shutdown().await;
}

#[tokio::test]
async fn resume_point_ahead_of_server_still_receives_live_events() {
    // A fresh server (last_seq 0), as after a restart, and a client that
    // remembers seq 50 from the previous run.
    let (addr, state) = spawn_server().await;
    let client = ProgressClient::new(format!("ws://{addr}/ws"));
    let mut conn = client.connect(Some(50)).await.unwrap();

    common::eventually(|| async { (state.ws_manager.connection_count().await == 1).then_some(()) })
        .await;

    state.hub.publish(ProgressUpdate::new("fresh-job").with_percent(3.0)).unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), conn.ws_stream.next())
        .await
        .expect("live event for a new job was not delivered")
        .unwrap()
        .unwrap();
    let text = frame.into_text().unwrap();
    let ServerMessage::Progress(message) = parse_server_message(&text).unwrap();
    assert_eq!(message.seq, Some(1));
    assert_eq!(message.payload.job_id(), Some("fresh-job"));
}
