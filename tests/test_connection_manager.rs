//! Integration tests for the connection manager against a local mock
//! tracking server: state machine, reconnect budget, subscription replay
//! and topic routing.

use fabz_link::{
    ClientMessage, ConnectionManager, ConnectionOptions, ConnectionState, EventHandlers,
    FabzLinkError, LinkTimeouts, ServerMessage,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

mod common;

use common::{eventually, init_logger, HttpFixture, MockTrackingServer};

const WAIT: Duration = Duration::from_secs(5);

fn quick_options(max_attempts: u32) -> ConnectionOptions {
    ConnectionOptions::default()
        .with_reconnect_interval_ms(50)
        .with_max_reconnect_attempts(max_attempts)
}

fn manager(base_url: &str, options: ConnectionOptions, handlers: EventHandlers) -> ConnectionManager {
    ConnectionManager::new(base_url, options, LinkTimeouts::fast(), handlers).unwrap()
}

fn subscribe_frame(topics: &[&str]) -> String {
    json!({"action": "subscribe", "topics": topics}).to_string()
}

const UNSUBSCRIBE_FRAME: &str = r#"{"action":"unsubscribe"}"#;

// ── lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_and_disconnect_lifecycle() {
    init_logger();
    let server = MockTrackingServer::start().await;

    let opened = Arc::new(AtomicUsize::new(0));
    let close_codes = Arc::new(Mutex::new(Vec::new()));
    let handlers = {
        let opened = Arc::clone(&opened);
        let close_codes = Arc::clone(&close_codes);
        EventHandlers::new()
            .on_open(move || {
                opened.fetch_add(1, Ordering::SeqCst);
            })
            .on_close(move |reason| close_codes.lock().push(reason.code))
    };
    let manager = manager(&server.base_url(), quick_options(5), handlers);

    manager.connect().await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert!(manager.is_connected());
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    // Already connected: no second socket.
    manager.connect().await.unwrap();
    assert!(server.wait_for_handshakes(1, WAIT).await);

    manager.subscribe("driver:D1").await.unwrap();
    assert!(server.wait_for_frame(&subscribe_frame(&["driver:D1"]), WAIT).await);

    manager.disconnect().await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(manager.topics().await.unwrap().is_empty());
    assert!(server.wait_for_frame(UNSUBSCRIBE_FRAME, WAIT).await);
    assert_eq!(*close_codes.lock(), vec![Some(1000)]);

    // No automatic reconnect after a deliberate disconnect.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(server.tcp_accepts(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_send_only_reaches_server_when_connected() {
    init_logger();
    let server = MockTrackingServer::start().await;
    let manager = manager(&server.base_url(), quick_options(5), EventHandlers::new());

    let err = manager.send(&ClientMessage::Unsubscribe).await.unwrap_err();
    assert!(err.is_not_connected());

    manager.connect().await.unwrap();
    manager.send(&ClientMessage::Unsubscribe).await.unwrap();
    assert!(server.wait_for_frame(UNSUBSCRIBE_FRAME, WAIT).await);
    assert_eq!(server.received().len(), 1);
}

// ── subscription registry over the wire ─────────────────────────────────────

#[tokio::test]
async fn test_subscribe_sends_full_set_only_on_change() {
    init_logger();
    let server = MockTrackingServer::start().await;
    let manager = manager(&server.base_url(), quick_options(5), EventHandlers::new());
    manager.connect().await.unwrap();

    manager.subscribe("driver:D1").await.unwrap();
    manager.subscribe("driver:D1").await.unwrap();
    manager
        .subscribe(vec!["route:R1".to_string(), "driver:D1".to_string()])
        .await
        .unwrap();
    manager.unsubscribe_topics("driver:D1").await.unwrap();
    manager.unsubscribe_topics("route:R1").await.unwrap();

    let expected = vec![
        subscribe_frame(&["driver:D1"]),
        subscribe_frame(&["driver:D1", "route:R1"]),
        subscribe_frame(&["route:R1"]),
        UNSUBSCRIBE_FRAME.to_string(),
    ];
    assert!(eventually(WAIT, || server.received().len() >= expected.len()).await);
    assert_eq!(server.received(), expected);
}

#[tokio::test]
async fn test_subscriptions_made_offline_are_sent_on_connect() {
    init_logger();
    let server = MockTrackingServer::start().await;
    let manager = manager(&server.base_url(), quick_options(5), EventHandlers::new());

    manager.subscribe(["driver:D2", "driver:D1"]).await.unwrap();
    manager.connect().await.unwrap();

    assert!(server.wait_for_frame(&subscribe_frame(&["driver:D1", "driver:D2"]), WAIT).await);
    assert_eq!(server.received().len(), 1);
}

#[tokio::test]
async fn test_reconnect_replays_current_set_once() {
    init_logger();
    let server = MockTrackingServer::start().await;
    let manager = manager(
        &server.base_url(),
        quick_options(5).with_reconnect_interval_ms(300),
        EventHandlers::new(),
    );
    manager.connect().await.unwrap();

    manager.subscribe("driver:D1").await.unwrap();
    assert!(server.wait_for_frame(&subscribe_frame(&["driver:D1"]), WAIT).await);

    server.drop_connections();
    manager
        .wait_until(|state| *state != ConnectionState::Connected, WAIT)
        .await
        .unwrap();

    // Changed while offline: the replay must carry the set as it is now.
    manager.subscribe("route:R9").await.unwrap();

    assert!(server.wait_for_handshakes(2, WAIT).await);
    manager.wait_for_state(ConnectionState::Connected, WAIT).await.unwrap();
    assert!(eventually(WAIT, || !server.received_on(2).is_empty()).await);
    sleep(Duration::from_millis(100)).await;

    assert_eq!(server.received_on(2), vec![subscribe_frame(&["driver:D1", "route:R9"])]);
    assert_eq!(manager.reconnect_attempts(), 0);
}

// ── reconnect budget ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnect_budget_exhaustion_enters_failed() {
    init_logger();
    let server = MockTrackingServer::start().await;

    let states = Arc::new(Mutex::new(Vec::new()));
    let handlers = {
        let states = Arc::clone(&states);
        EventHandlers::new().on_state_change(move |state| states.lock().push(state))
    };
    let manager = manager(&server.base_url(), quick_options(2), handlers);
    manager.connect().await.unwrap();

    server.set_refuse(true);
    server.drop_connections();

    manager.wait_for_state(ConnectionState::Failed, WAIT).await.unwrap();
    assert_eq!(manager.reconnect_attempts(), 2);
    // One successful open plus exactly two refused retries.
    assert_eq!(server.tcp_accepts(), 3);

    let err = manager.send(&ClientMessage::Unsubscribe).await.unwrap_err();
    assert!(matches!(err, FabzLinkError::NotConnected(ConnectionState::Failed)));

    // No further automatic attempts.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(server.tcp_accepts(), 3);
    assert_eq!(manager.state(), ConnectionState::Failed);

    let seen = states.lock().clone();
    assert_eq!(
        seen,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Connecting,
            ConnectionState::Reconnecting,
            ConnectionState::Connecting,
            ConnectionState::Failed,
        ]
    );

    // An explicit connect() starts over.
    server.set_refuse(false);
    manager.connect().await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.reconnect_attempts(), 0);
}

#[tokio::test]
async fn test_initial_connect_failure_schedules_retries() {
    init_logger();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let errors = Arc::new(AtomicUsize::new(0));
    let handlers = {
        let errors = Arc::clone(&errors);
        EventHandlers::new().on_error(move |_| {
            errors.fetch_add(1, Ordering::SeqCst);
        })
    };
    let manager = manager(&format!("http://{}", addr), quick_options(1), handlers);

    let err = manager.connect().await.unwrap_err();
    assert!(matches!(err, FabzLinkError::WebSocketError(_)));
    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    assert_eq!(manager.reconnect_attempts(), 1);

    manager.wait_for_state(ConnectionState::Failed, WAIT).await.unwrap();
    assert_eq!(manager.reconnect_attempts(), 1);
    // Two failed attempts plus the budget-exhausted report.
    assert_eq!(errors.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rejected_handshake_is_not_retried() {
    init_logger();
    let http = HttpFixture::start().await;
    let manager = manager(&http.base_url(), quick_options(5), EventHandlers::new());

    let err = manager.connect().await.unwrap_err();
    assert!(matches!(err, FabzLinkError::WebSocketError(_)));
    assert_eq!(manager.state(), ConnectionState::Failed);
    assert_eq!(manager.reconnect_attempts(), 0);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(http.hits("/ws"), 1);
}

#[tokio::test]
async fn test_transport_loss_without_auto_reconnect() {
    init_logger();
    let server = MockTrackingServer::start().await;
    let manager = manager(
        &server.base_url(),
        quick_options(5).with_auto_reconnect(false),
        EventHandlers::new(),
    );
    manager.connect().await.unwrap();

    server.drop_connections();
    manager
        .wait_for_state(ConnectionState::Disconnected, WAIT)
        .await
        .unwrap();
    sleep(Duration::from_millis(200)).await;
    assert_eq!(server.tcp_accepts(), 1);
}

// ── routing ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_listen_routes_by_topic_and_releases_topic() {
    init_logger();
    let server = MockTrackingServer::start().await;

    let raw_frames = Arc::new(AtomicUsize::new(0));
    let handlers = {
        let raw_frames = Arc::clone(&raw_frames);
        EventHandlers::new().on_message(move |_| {
            raw_frames.fetch_add(1, Ordering::SeqCst);
        })
    };
    let manager = manager(&server.base_url(), quick_options(5), handlers);
    manager.connect().await.unwrap();

    let d1 = Arc::new(Mutex::new(Vec::new()));
    let guard = {
        let d1 = Arc::clone(&d1);
        manager
            .listen("driver:D1", move |message: &ServerMessage| d1.lock().push(message.clone()))
            .await
            .unwrap()
    };
    assert!(server.wait_for_frame(&subscribe_frame(&["driver:D1"]), WAIT).await);

    let location = json!({
        "latitude": 12.9, "longitude": 77.6, "accuracy": 5.0,
        "timestamp": "2024-05-01T10:00:00Z"
    });
    server.push(json!({"type": "driver_update", "driverId": "D2", "location": location}));
    server.push(json!({"type": "mystery", "payload": 1}));
    server.push(json!({"type": "driver_update", "driverId": "D1", "location": location}));

    assert!(eventually(WAIT, || d1.lock().len() == 1).await);
    assert!(eventually(WAIT, || raw_frames.load(Ordering::SeqCst) == 3).await);
    assert!(matches!(
        &d1.lock()[0],
        ServerMessage::DriverUpdate { driver_id, .. } if driver_id == "D1"
    ));

    drop(guard);
    assert!(server.wait_for_frame(UNSUBSCRIBE_FRAME, WAIT).await);
    assert!(manager.topics().await.unwrap().is_empty());
}

// ── pending handshakes ───────────────────────────────────────────────────────

/// Accepts TCP connections and never answers the WebSocket upgrade.
async fn silent_listener() -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    (base_url, task)
}

#[tokio::test]
async fn test_disconnect_cancels_pending_handshake() {
    init_logger();
    let (base_url, listener) = silent_listener().await;
    let manager = Arc::new(manager(&base_url, quick_options(5), EventHandlers::new()));

    let pending = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.connect().await })
    };
    manager
        .wait_for_state(ConnectionState::Connecting, WAIT)
        .await
        .unwrap();

    // Served while the handshake is still outstanding.
    manager.subscribe("driver:D1").await.unwrap();
    assert_eq!(manager.topics().await.unwrap(), vec!["driver:D1"]);

    tokio::time::timeout(Duration::from_millis(500), manager.disconnect())
        .await
        .expect("disconnect waited for the handshake")
        .unwrap();
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    let result = tokio::time::timeout(Duration::from_millis(500), pending)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(FabzLinkError::WebSocketError(_))));

    // No retry follows a cancelled attempt.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.reconnect_attempts(), 0);
    listener.abort();
}

#[tokio::test]
async fn test_shutdown_during_pending_handshake() {
    init_logger();
    let (base_url, listener) = silent_listener().await;
    let manager = manager(&base_url, quick_options(5), EventHandlers::new());
    let state = manager.state_watch();

    // Give up waiting on the caller side; the attempt keeps running.
    let abandoned = tokio::time::timeout(Duration::from_millis(100), manager.connect()).await;
    assert!(abandoned.is_err());
    assert_eq!(manager.state(), ConnectionState::Connecting);

    tokio::time::timeout(Duration::from_millis(500), manager.shutdown())
        .await
        .expect("shutdown waited for the handshake");
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    listener.abort();
}
