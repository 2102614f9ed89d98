//! WebSocket Message Types
//!
//! JSON text frames tagged by `type`. Alert payloads are pre-serialized by
//! [`Payload`](crate::domain::Payload); the frames here are the session's own
//! control traffic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ChannelId, UserId};
use crate::shared::error::GatewayError;

/// Incoming client frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Credential, accepted only during the handshake
    Auth { token: String },
    /// Keepalive; answered with a pong
    Ping,
    /// Client acknowledgment of an alert (accepted, not acted on)
    Ack {
        #[serde(default)]
        alert_id: Option<Value>,
    },
    /// Explicit close request
    Close,
}

impl ClientFrame {
    /// Parse a text frame.
    ///
    /// A bare `ping` is accepted for clients that send plain-text keepalives.
    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("ping") {
            return Ok(ClientFrame::Ping);
        }
        serde_json::from_str(trimmed).map_err(|e| GatewayError::Protocol(e.to_string()))
    }
}

/// Outgoing control frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once the channel is registered
    Ready {
        user_id: UserId,
        channel_id: ChannelId,
    },
    Pong { message: &'static str },
}

impl ServerFrame {
    pub fn pong() -> Self {
        ServerFrame::Pong {
            message: "Connection alive",
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
