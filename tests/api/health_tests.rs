//! Health and Metrics Endpoint Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use crate::common::{body_json, TestApp};
use alert_gateway::domain::{ChannelHandle, UserId};

#[tokio::test]
async fn test_health_check_reports_empty_registry() {
    let app = TestApp::new();

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["active_users"], 0);
    assert_eq!(json["active_channels"], 0);
    assert!(json.get("version").is_some());
}

#[tokio::test]
async fn test_health_check_counts_registered_channels() {
    let app = TestApp::new();
    let alice = UserId::from("alice");
    for _ in 0..2 {
        let (channel, _rx) = ChannelHandle::new(alice.clone(), None, 4);
        channel.open();
        app.state.registry.register(&alice, channel).unwrap();
    }

    let json = body_json(app.get("/health").await).await;
    assert_eq!(json["active_users"], 1);
    assert_eq!(json["active_channels"], 2);
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();

    let response = app.get("/health/live").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "alive");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_gateway_metrics() {
    let app = TestApp::new();

    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("alert_gateway_channels_active"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new();
    assert_eq!(app.get("/gateway").await.status(), StatusCode::NOT_FOUND);
}
