//! Application Error Types
//!
//! Centralized error handling with Axum integration, plus the error taxonomy
//! of the connection lifecycle.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::{AuthError, UserId};

/// HTTP-facing application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, 10001, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, 10002, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, 10003, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, 10004, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
        };

        let body = ErrorResponse { code, message };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}

/// Connection lifecycle errors.
///
/// Handshake and protocol errors end a single connection. `Backpressure` and
/// `ChannelClosed` are per-channel delivery outcomes and never fail a
/// publish as a whole.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("No credential presented")]
    MissingCredential,

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Credential for {authenticated} cannot open a channel for {requested}")]
    UserMismatch {
        requested: UserId,
        authenticated: UserId,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Outbound queue full ({drops} consecutive drops)")]
    Backpressure { drops: u32 },

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// WebSocket close code used when this error terminates a connection.
    pub fn close_code(&self) -> u16 {
        match self {
            GatewayError::Auth(_)
            | GatewayError::MissingCredential
            | GatewayError::HandshakeTimeout
            | GatewayError::UserMismatch { .. } => 1008,
            GatewayError::Protocol(_) => 1002,
            GatewayError::Backpressure { .. } => 1008,
            GatewayError::ChannelClosed | GatewayError::ShuttingDown => 1001,
            GatewayError::Internal(_) => 1011,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Auth(AuthError::InvalidToken) => "invalid_token",
            GatewayError::Auth(AuthError::Expired) => "expired",
            GatewayError::Auth(AuthError::Malformed) => "malformed",
            GatewayError::MissingCredential => "missing_credential",
            GatewayError::HandshakeTimeout => "handshake_timeout",
            GatewayError::UserMismatch { .. } => "user_mismatch",
            GatewayError::Protocol(_) => "protocol",
            GatewayError::Backpressure { .. } => "backpressure",
            GatewayError::ChannelClosed => "channel_closed",
            GatewayError::ShuttingDown => "shutting_down",
            GatewayError::Internal(_) => "internal",
        }
    }

    /// Reason text sent in the close frame.
    ///
    /// Kept short: close frame reasons are limited to 123 bytes.
    pub fn close_reason(&self) -> &'static str {
        match self {
            GatewayError::Auth(AuthError::Expired) => "Token expired",
            GatewayError::Auth(_) => "Invalid token",
            GatewayError::MissingCredential => "No token provided",
            GatewayError::HandshakeTimeout => "Authentication timeout",
            GatewayError::UserMismatch { .. } => "Token user_id mismatch",
            GatewayError::Protocol(_) => "Malformed frame",
            GatewayError::Backpressure { .. } => "Slow consumer",
            GatewayError::ChannelClosed => "Channel closed",
            GatewayError::ShuttingDown => "Server shutting down",
            GatewayError::Internal(_) => "Internal error",
        }
    }
}
