//! WebSocket Connection Handler
//!
//! Upgrades `GET /ws/{user_id}` and hands the socket to the session
//! supervisor.

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;

use crate::domain::UserId;
use crate::startup::AppState;

/// Query parameters accepted on upgrade
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Bearer credential; may instead arrive in an `auth` frame
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let requested = UserId::new(user_id);
    let sessions = state.sessions.clone();

    ws.max_message_size(state.settings.websocket.max_message_size)
        .on_upgrade(move |socket| async move {
            sessions.run(socket, requested, params.token).await;
        })
}
