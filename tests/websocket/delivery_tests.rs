//! End-to-end Delivery Tests
//!
//! Payloads published through the dispatcher arriving on real sockets.

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{next_json, wait_until, SpawnedApp};
use alert_gateway::application::services::{DeliveryOutcome, RoleFilter};
use alert_gateway::domain::{AlertEvent, Payload, UserId};

#[tokio::test]
async fn test_published_alert_reaches_client() {
    let app = SpawnedApp::start().await;
    let alice = UserId::from("alice");
    let (mut ws, ready) = app.connect("alice").await;

    let result = app
        .state
        .dispatcher
        .publish(&alice, Payload::alert(json!({ "id": "alert-1" })).unwrap());

    assert_eq!(result.deliveries().len(), 1);
    assert_eq!(result.deliveries()[0].outcome, DeliveryOutcome::Delivered);
    assert_eq!(
        result.deliveries()[0].channel_id.to_string(),
        ready["channel_id"].as_str().unwrap()
    );

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["type"], "new_alert");
    assert_eq!(frame["alert"], json!({ "id": "alert-1" }));
    assert!(frame["timestamp"].is_string());
}

#[tokio::test]
async fn test_payloads_arrive_in_publish_order() {
    let app = SpawnedApp::start().await;
    let alice = UserId::from("alice");
    let (mut ws, _) = app.connect("alice").await;

    for n in 1..=20 {
        app.state
            .dispatcher
            .publish(&alice, Payload::alert(json!({ "seq": n })).unwrap());
    }

    for n in 1..=20 {
        assert_eq!(next_json(&mut ws).await["alert"]["seq"], n);
    }
}

#[tokio::test]
async fn test_every_device_receives_the_alert() {
    let app = SpawnedApp::start().await;
    let alice = UserId::from("alice");
    let (mut phone, _) = app.connect("alice").await;
    let (mut laptop, _) = app.connect("alice").await;
    assert_eq!(app.state.registry.count(&alice), 2);

    let result = app
        .state
        .dispatcher
        .publish(&alice, Payload::new(AlertEvent::AlertDeleted { alert_id: 4 }).unwrap());
    assert_eq!(result.delivered(), 2);

    for ws in [&mut phone, &mut laptop] {
        let frame = next_json(ws).await;
        assert_eq!(frame["type"], "alert_deleted");
        assert_eq!(frame["alert_id"], 4);
    }
}

#[tokio::test]
async fn test_other_users_are_unaffected() {
    let app = SpawnedApp::start().await;
    let (mut alice_ws, _) = app.connect("alice").await;
    let (mut bob_ws, _) = app.connect("bob").await;

    app.state.dispatcher.publish(
        &UserId::from("bob"),
        Payload::alert(json!({ "for": "bob" })).unwrap(),
    );
    app.state.dispatcher.publish(
        &UserId::from("alice"),
        Payload::alert(json!({ "for": "alice" })).unwrap(),
    );

    assert_eq!(next_json(&mut alice_ws).await["alert"]["for"], "alice");
    assert_eq!(next_json(&mut bob_ws).await["alert"]["for"], "bob");
}

#[tokio::test]
async fn test_publish_after_disconnect_reports_no_channel() {
    let app = SpawnedApp::start().await;
    let alice = UserId::from("alice");
    let (ws, _) = app.connect("alice").await;

    drop(ws);
    assert!(wait_until(|| app.state.registry.count(&alice) == 0).await);

    let result = app
        .state
        .dispatcher
        .publish(&alice, Payload::alert(json!({ "id": 1 })).unwrap());
    assert!(result.is_no_channel());
}

#[tokio::test]
async fn test_disconnect_with_payloads_in_flight() {
    let app = SpawnedApp::start().await;
    let alice = UserId::from("alice");
    let (ws, _) = app.connect("alice").await;

    for n in 0..1000 {
        app.state
            .dispatcher
            .publish(&alice, Payload::alert(json!({ "seq": n })).unwrap());
    }
    drop(ws);

    assert!(wait_until(|| app.state.registry.count(&alice) == 0).await);
    assert_eq!(app.state.registry.total_channels(), 0);
}

#[tokio::test]
async fn test_role_broadcast_over_sockets() {
    let app = SpawnedApp::start().await;
    let (mut student, _) = app.connect_as("s1", Some("student")).await;
    let (_staff, _) = app.connect_as("t1", Some("staff")).await;

    let result = app.state.dispatcher.broadcast(
        Payload::alert(json!({ "id": "exam" })).unwrap(),
        &RoleFilter::from_targets(Some(&["students"][..])),
    );

    assert_eq!(result.deliveries().len(), 1);
    assert_eq!(result.deliveries()[0].user_id, UserId::from("s1"));
    assert_eq!(next_json(&mut student).await["alert"]["id"], "exam");
}
