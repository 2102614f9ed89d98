//! Alert Source Endpoint Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{body_json, sign_token, TestApp};
use alert_gateway::domain::{ChannelHandle, UserId};

const NEW_ALERT: &str = r#"{"type":"new_alert","alert":{"id":"alert-1"}}"#;

#[tokio::test]
async fn test_publish_requires_authorization_header() {
    let app = TestApp::new();

    let response = app.post_json("/api/v1/alerts/users/alice", NEW_ALERT).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_publish_rejects_invalid_token() {
    let app = TestApp::new();

    let response = app
        .post_json_auth("/api/v1/alerts/users/alice", NEW_ALERT, "not-a-jwt")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_publish_requires_admin_role() {
    let app = TestApp::new();
    let token = sign_token("7", Some("student"));

    let response = app
        .post_json_auth("/api/v1/alerts/users/alice", NEW_ALERT, &token)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_publish_to_offline_user_reports_no_channel() {
    let app = TestApp::new();
    let token = sign_token("1", Some("admin"));

    let response = app
        .post_json_auth("/api/v1/alerts/users/alice", NEW_ALERT, &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "no_channel" }));
}

#[tokio::test]
async fn test_publish_enqueues_on_live_channel() {
    let app = TestApp::new();
    let alice = UserId::from("alice");
    let (channel, mut rx) = ChannelHandle::new(alice.clone(), None, 4);
    channel.open();
    app.state.registry.register(&alice, channel.clone()).unwrap();
    let token = sign_token("1", Some("Admin"));

    let response = app
        .post_json_auth("/api/v1/alerts/users/alice", NEW_ALERT, &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "dispatched");
    assert_eq!(json["deliveries"][0]["outcome"], "delivered");
    assert_eq!(json["deliveries"][0]["user_id"], "alice");

    let payload = rx.try_recv().unwrap();
    let frame: serde_json::Value = serde_json::from_str(payload.body()).unwrap();
    assert_eq!(frame["type"], "new_alert");
    assert_eq!(frame["alert"]["id"], "alert-1");
}

#[tokio::test]
async fn test_publish_rejects_unknown_event_type() {
    let app = TestApp::new();
    let token = sign_token("1", Some("admin"));

    let response = app
        .post_json_auth(
            "/api/v1/alerts/users/alice",
            r#"{"type":"self_destruct"}"#,
            &token,
        )
        .await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_broadcast_targets_roles() {
    let app = TestApp::new();
    let token = sign_token("1", Some("admin"));

    let mut receivers = Vec::new();
    for (user, role) in [("s1", "student"), ("s2", "student"), ("t1", "staff")] {
        let user_id = UserId::from(user);
        let (channel, rx) = ChannelHandle::new(user_id.clone(), Some(role.into()), 4);
        channel.open();
        app.state.registry.register(&user_id, channel).unwrap();
        receivers.push(rx);
    }

    let body = json!({
        "event": { "type": "alert_deleted", "alert_id": 9 },
        "target_roles": ["students"]
    });
    let response = app
        .post_json_auth("/api/v1/alerts/broadcast", &body.to_string(), &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["deliveries"].as_array().unwrap().len(), 2);
    assert!(receivers[0].try_recv().is_ok());
    assert!(receivers[1].try_recv().is_ok());
    assert!(receivers[2].try_recv().is_err());
}

#[tokio::test]
async fn test_broadcast_to_all() {
    let app = TestApp::new();
    let token = sign_token("1", Some("admin"));

    for user in ["a", "b"] {
        let user_id = UserId::from(user);
        let (channel, _rx) = ChannelHandle::new(user_id.clone(), None, 4);
        channel.open();
        app.state.registry.register(&user_id, channel).unwrap();
    }

    let body = json!({
        "event": { "type": "reaction_update", "reaction": { "emoji": "+1" } },
        "target_roles": ["all"]
    });
    let response = app
        .post_json_auth("/api/v1/alerts/broadcast", &body.to_string(), &token)
        .await;

    let json = body_json(response).await;
    assert_eq!(json["deliveries"].as_array().unwrap().len(), 2);
}
