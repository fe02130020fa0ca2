use chrono::{TimeZone, Utc};
use serde_json::json;

use super::*;

fn sample_location() -> TrackingLocation {
    TrackingLocation::new(12.9, 77.6, 5.0, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
}

// ==================== ConnectionOptions Tests ====================

#[test]
fn test_connection_options_default() {
    let opts = ConnectionOptions::default();

    assert!(opts.auto_reconnect, "auto_reconnect should default to true");
    assert_eq!(opts.reconnect_interval_ms, 3000, "reconnect_interval_ms should default to 3000");
    assert_eq!(opts.max_reconnect_attempts, 5, "max_reconnect_attempts should default to 5");
    assert_eq!(opts.ws_path, "/ws");
}

#[test]
fn test_connection_options_builder_pattern() {
    let opts = ConnectionOptions::new()
        .with_auto_reconnect(false)
        .with_reconnect_interval_ms(250)
        .with_max_reconnect_attempts(2)
        .with_ws_path("/live");

    assert!(!opts.auto_reconnect);
    assert_eq!(opts.reconnect_interval_ms, 250);
    assert_eq!(opts.max_reconnect_attempts, 2);
    assert_eq!(opts.ws_path, "/live");
}

#[test]
fn test_connection_options_partial_deserialize_uses_defaults() {
    let opts: ConnectionOptions = serde_json::from_value(json!({
        "max_reconnect_attempts": 9
    }))
    .unwrap();

    assert_eq!(opts.max_reconnect_attempts, 9);
    assert!(opts.auto_reconnect);
    assert_eq!(opts.reconnect_interval_ms, 3000);
}

// ==================== ClientMessage Tests ====================

#[test]
fn test_subscribe_message_shape() {
    let msg = ClientMessage::Subscribe {
        topics: vec!["driver:D1".to_string(), "route:R7".to_string()],
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value, json!({"action": "subscribe", "topics": ["driver:D1", "route:R7"]}));
}

#[test]
fn test_unsubscribe_message_shape() {
    let value = serde_json::to_value(ClientMessage::Unsubscribe).unwrap();
    assert_eq!(value, json!({"action": "unsubscribe"}));
}

#[test]
fn test_location_update_message_uses_camel_case() {
    let msg = ClientMessage::LocationUpdate {
        driver_id: "D1".to_string(),
        location: sample_location().with_speed(3.5),
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["action"], "location_update");
    assert_eq!(value["driverId"], "D1");
    assert_eq!(value["location"]["latitude"], 12.9);
    assert_eq!(value["location"]["speed"], 3.5);
    assert!(value["location"].get("heading").is_none(), "absent heading is omitted");
    assert_eq!(value["location"]["timestamp"], "2024-05-01T10:00:00Z");
}

// ==================== ServerMessage Tests ====================

#[test]
fn test_driver_update_parses_and_routes() {
    let msg: ServerMessage = serde_json::from_value(json!({
        "type": "driver_update",
        "driverId": "D1",
        "location": {
            "latitude": 12.9,
            "longitude": 77.6,
            "accuracy": 4.0,
            "timestamp": "2024-05-01T10:00:00.000Z"
        },
        "status": "on_route"
    }))
    .unwrap();

    assert_eq!(msg.topic(), "driver:D1");
    match msg {
        ServerMessage::DriverUpdate { driver_id, location, status } => {
            assert_eq!(driver_id, "D1");
            assert_eq!(location.accuracy, 4.0);
            assert_eq!(location.speed, None);
            assert_eq!(status, Some(DriverStatus::OnRoute));
        },
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_route_update_parses_and_routes() {
    let msg: ServerMessage = serde_json::from_value(json!({
        "type": "route_update",
        "routeId": "R7",
        "position": {
            "latitude": 1.0,
            "longitude": 2.0,
            "accuracy": 10.0,
            "timestamp": "2024-05-01T10:00:00+05:30",
            "heading": 90.0
        }
    }))
    .unwrap();

    assert_eq!(msg.topic(), "route:R7");
    if let ServerMessage::RouteUpdate { position, driver_id, status, .. } = msg {
        assert_eq!(position.heading, Some(90.0));
        assert_eq!(position.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 4, 30, 0).unwrap());
        assert!(driver_id.is_none());
        assert!(status.is_none());
    } else {
        panic!("expected route_update");
    }
}

#[test]
fn test_ack_routes_to_control_topic() {
    let msg: ServerMessage =
        serde_json::from_str(r#"{"type":"ack","topics":["driver:D1"]}"#).unwrap();
    assert_eq!(msg.topic(), CONTROL_TOPIC);
}

#[test]
fn test_unknown_server_message_type_is_rejected() {
    let result = serde_json::from_str::<ServerMessage>(r#"{"type":"chat","body":"hi"}"#);
    assert!(result.is_err());
}

// ==================== Entity Tests ====================

#[test]
fn test_driver_tracking_snapshot_defaults() {
    let driver: DriverTracking = serde_json::from_value(json!({
        "driverId": "D9",
        "lastLocation": {
            "latitude": 0.0,
            "longitude": 0.0,
            "accuracy": 1.0,
            "timestamp": "2024-05-01T10:00:00Z"
        }
    }))
    .unwrap();

    assert_eq!(driver.driver_id, "D9");
    assert_eq!(driver.status, DriverStatus::Available);
    assert!(driver.name.is_none());
}

#[test]
fn test_route_tracking_current_position() {
    let mut route = RouteTracking::new("R1", sample_location().timestamp);
    assert!(route.current_position().is_none());
    route.positions.push(sample_location());
    assert_eq!(route.current_position(), Some(&sample_location()));
}

#[test]
fn test_track_event_parses_nullable_fields() {
    let event: TrackEvent = serde_json::from_value(json!({
        "id": 3,
        "orderId": 41,
        "workerId": null,
        "action": "picked_up",
        "note": null,
        "location": "Koramangala hub",
        "createdAt": "2024-05-01T10:00:00Z"
    }))
    .unwrap();

    assert_eq!(event.order_id, 41);
    assert!(event.worker_id.is_none());
    assert_eq!(event.location.as_deref(), Some("Koramangala hub"));
}

// ==================== TrackingLocation Tests ====================

#[test]
fn test_location_validation() {
    assert!(sample_location().validate().is_ok());

    let mut bad = sample_location();
    bad.latitude = 91.0;
    assert!(bad.validate().is_err());

    let mut bad = sample_location();
    bad.longitude = f64::NAN;
    assert!(bad.validate().is_err());

    let mut bad = sample_location();
    bad.accuracy = -1.0;
    assert!(bad.validate().is_err());

    let bad = sample_location().with_speed(f64::INFINITY);
    assert!(bad.validate().is_err());
}

#[test]
fn test_distance_between_locations() {
    let a = TrackingLocation::new(0.0, 0.0, 1.0, Utc::now());
    let b = TrackingLocation::new(0.0, 1.0, 1.0, Utc::now());
    let d = a.distance_m(&b);
    // One degree of longitude at the equator is ~111.2 km.
    assert!((d - 111_195.0).abs() < 200.0, "got {}", d);
    assert_eq!(a.distance_m(&a), 0.0);
}

// ==================== Topic Tests ====================

#[test]
fn test_topic_helpers() {
    assert_eq!(driver_topic("D1"), "driver:D1");
    assert_eq!(route_topic("R1"), "route:R1");
    assert_eq!(parse_topic("driver:D1"), TopicKind::Driver("D1"));
    assert_eq!(parse_topic("route:R1"), TopicKind::Route("R1"));
    assert_eq!(parse_topic(CONTROL_TOPIC), TopicKind::Control);
    assert_eq!(parse_topic("misc"), TopicKind::Other("misc"));
}

#[test]
fn test_connection_state_display() {
    assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    assert!(ConnectionState::Connected.is_connected());
    assert!(ConnectionState::Connecting.is_transient());
    assert!(!ConnectionState::Failed.is_transient());
    assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
}

// ==================== Tracking / Watch Options Tests ====================

#[test]
fn test_tracking_options_defaults() {
    let opts = TrackingOptions::default();
    assert_eq!(opts.active_poll_interval_ms, 30_000);
    assert_eq!(opts.max_route_points, 500);

    let parsed: TrackingOptions = serde_json::from_value(json!({"max_route_points": 10})).unwrap();
    assert_eq!(parsed.active_poll_interval_ms, 30_000);
    assert_eq!(parsed.max_route_points, 10);
}

#[test]
fn test_watch_options_defaults_and_builder() {
    let opts = WatchOptions::default();
    assert!(opts.high_accuracy);
    assert_eq!(opts.maximum_age_ms, 10_000);
    assert_eq!(opts.timeout_ms, 15_000);
    assert_eq!(opts.min_interval_ms, 5_000);
    assert_eq!(opts.min_distance_m, 0.0);

    let opts = WatchOptions::new().with_min_interval_ms(0).with_min_distance_m(25.0);
    assert_eq!(opts.min_interval_ms, 0);
    assert_eq!(opts.min_distance_m, 25.0);
}
