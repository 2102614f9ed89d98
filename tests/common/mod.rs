//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use alert_gateway::config::{
    CorsSettings, JwtSettings, ServerSettings, Settings, WebSocketSettings,
};
use alert_gateway::infrastructure::auth::{Claims, JwtCredentialVerifier};
use alert_gateway::presentation::http::create_router;
use alert_gateway::startup::{AppState, Application};
use axum::{body::Body, http::Request, Router};
use futures::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-chars";

/// How long a test waits for any single frame or state change.
pub const WAIT: Duration = Duration::from_secs(5);

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Settings bound to an ephemeral localhost port.
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        jwt: JwtSettings {
            secret: TEST_SECRET.into(),
            leeway_secs: 0,
        },
        websocket: WebSocketSettings {
            handshake_timeout_secs: 2,
            shutdown_grace_secs: 5,
            ..WebSocketSettings::default()
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        environment: "test".into(),
    }
}

/// Sign an access token for `user_id`.
pub fn sign_token(user_id: &str, role: Option<&str>) -> String {
    sign_token_expiring(user_id, role, chrono::Utc::now().timestamp() + 3600)
}

pub fn sign_token_expiring(user_id: &str, role: Option<&str>, exp: i64) -> String {
    let claims = Claims {
        sub: Some(user_id.to_string()),
        user_id: None,
        exp,
        role: role.map(str::to_string),
        username: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Router-level test application for HTTP requests
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let settings = test_settings();
        let verifier = Arc::new(JwtCredentialVerifier::new(&settings.jwt));
        let state = AppState::new(settings, verifier);

        Self {
            router: create_router(state.clone()),
            state,
        }
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json_auth(
        &self,
        uri: &str,
        body: &str,
        token: &str,
    ) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

/// Read a response body as JSON
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A server listening on a real socket
pub struct SpawnedApp {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<anyhow::Result<()>>,
}

impl SpawnedApp {
    pub async fn start() -> Self {
        Self::start_with(test_settings()).await
    }

    pub async fn start_with(settings: Settings) -> Self {
        let app = Application::build(settings).await.unwrap();
        let addr = app.local_addr().unwrap();
        let state = app.state().clone();

        let (tx, rx) = oneshot::channel();
        let server = tokio::spawn(app.run_with_shutdown(async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            state,
            shutdown: Some(tx),
            server,
        }
    }

    pub fn ws_url(&self, user_id: &str, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws/{}?token={}", self.addr, user_id, token),
            None => format!("ws://{}/ws/{}", self.addr, user_id),
        }
    }

    /// Open a socket without waiting for the handshake outcome.
    pub async fn connect_raw(&self, user_id: &str, token: Option<&str>) -> WsClient {
        let (ws, _) = connect_async(self.ws_url(user_id, token)).await.unwrap();
        ws
    }

    /// Connect with a freshly signed token and wait for the `ready` frame.
    pub async fn connect(&self, user_id: &str) -> (WsClient, Value) {
        self.connect_as(user_id, None).await
    }

    pub async fn connect_as(&self, user_id: &str, role: Option<&str>) -> (WsClient, Value) {
        let token = sign_token(user_id, role);
        let mut ws = self.connect_raw(user_id, Some(&token)).await;
        let ready = next_json(&mut ws).await;
        assert_eq!(ready["type"], "ready");
        (ws, ready)
    }

    /// Trigger graceful shutdown and wait for the server to return.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), self.server)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
    }
}

/// Next JSON text frame, skipping control frames.
pub async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected a text frame, got {:?}", other),
        }
    }
}

/// Wait for the server's close frame and return its code and reason.
pub async fn expect_close(ws: &mut WsClient) -> (u16, String) {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended without a close frame")
            .expect("websocket error");
        match message {
            Message::Close(Some(frame)) => {
                return (u16::from(frame.code), frame.reason.as_str().to_string())
            }
            Message::Close(None) => return (u16::from(CloseCode::Status), String::new()),
            _ => continue,
        }
    }
}

pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

/// Poll `condition` until it holds or [`WAIT`] elapses.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
