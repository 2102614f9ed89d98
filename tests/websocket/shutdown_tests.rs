//! Graceful Shutdown Tests

use pretty_assertions::assert_eq;

use crate::common::{expect_close, wait_until, SpawnedApp};
use alert_gateway::domain::UserId;

#[tokio::test]
async fn test_shutdown_closes_and_drains_channels() {
    let app = SpawnedApp::start().await;
    let (mut alice, _) = app.connect("alice").await;
    let (mut bob, _) = app.connect("bob").await;
    let state = app.state.clone();
    assert_eq!(state.registry.total_channels(), 2);

    let stopping = tokio::spawn(app.shutdown());

    for ws in [&mut alice, &mut bob] {
        let (code, reason) = expect_close(ws).await;
        assert_eq!(code, 1001);
        assert_eq!(reason, "server_shutdown");
    }

    stopping.await.unwrap().unwrap();
    assert_eq!(state.registry.total_channels(), 0);
    assert_eq!(state.registry.total_users(), 0);
}

#[tokio::test]
async fn test_shutdown_with_no_connections() {
    let app = SpawnedApp::start().await;
    let state = app.state.clone();

    app.shutdown().await.unwrap();
    assert_eq!(state.registry.stats().active_channels, 0);
}

#[tokio::test]
async fn test_shutdown_rejects_connection_still_in_handshake() {
    let app = SpawnedApp::start().await;
    let state = app.state.clone();

    // No token yet: the session is waiting for an auth frame.
    let mut pending = app.connect_raw("alice", None).await;

    let stopping = tokio::spawn(app.shutdown());
    assert!(wait_until(|| state.registry.is_closing()).await);

    let (code, reason) = expect_close(&mut pending).await;
    assert_eq!(code, 1001);
    assert_eq!(reason, "Server shutting down");

    stopping.await.unwrap().unwrap();
    assert_eq!(state.registry.total_channels(), 0);
    assert_eq!(state.registry.count(&UserId::from("alice")), 0);
}
