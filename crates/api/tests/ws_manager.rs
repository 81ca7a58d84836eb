//! Unit tests for `WsManager`.
//!
//! These tests exercise the WebSocket connection manager directly, without
//! performing any HTTP upgrades.

use axum::extract::ws::Message;
use pictopy_api::ws::WsManager;

#[tokio::test]
async fn new_manager_has_zero_connections() {
    let manager = WsManager::new();

    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string(), None).await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("nonexistent").await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn send_to_reaches_only_the_target() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), None).await;
    let mut rx2 = manager.add("conn-2".to_string(), None).await;

    assert!(manager.send_to("conn-2", Message::Text("hi".into())).await);
    assert!(!manager.send_to("conn-3", Message::Text("hi".into())).await);

    let msg = rx2.recv().await.expect("rx2 should receive the message");
    assert!(matches!(&msg, Message::Text(t) if t.as_str() == "hi"));
    assert!(rx1.try_recv().is_err());
}

#[tokio::test]
async fn send_to_reports_closed_receiver() {
    let manager = WsManager::new();

    let rx = manager.add("conn-1".to_string(), None).await;
    drop(rx);

    assert!(!manager.send_to("conn-1", Message::Text("hi".into())).await);
}

#[tokio::test]
async fn connection_info_lists_resume_points_oldest_first() {
    let manager = WsManager::new();

    let _rx1 = manager.add("first".to_string(), None).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let _rx2 = manager.add("second".to_string(), Some(42)).await;

    let info = manager.connection_info().await;
    assert_eq!(info.len(), 2);
    assert_eq!(info[0].conn_id, "first");
    assert_eq!(info[0].since, None);
    assert_eq!(info[1].conn_id, "second");
    assert_eq!(info[1].since, Some(42));
}

#[tokio::test]
async fn ping_all_sends_ping_to_every_connection() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), None).await;
    let mut rx2 = manager.add("conn-2".to_string(), None).await;

    manager.ping_all().await;

    assert!(matches!(rx1.recv().await, Some(Message::Ping(_))));
    assert!(matches!(rx2.recv().await, Some(Message::Ping(_))));
}

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), None).await;
    let mut rx2 = manager.add("conn-2".to_string(), None).await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);

    let msg1 = rx1.recv().await.expect("rx1 should receive Close");
    assert!(matches!(msg1, Message::Close(None)), "Expected Close(None), got: {msg1:?}");
    let msg2 = rx2.recv().await.expect("rx2 should receive Close");
    assert!(matches!(msg2, Message::Close(None)), "Expected Close(None), got: {msg2:?}");

    // After Close, the channel should be closed (no more messages).
    assert!(rx1.recv().await.is_none(), "Channel should be closed after shutdown");
}
