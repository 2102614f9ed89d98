//! Alert payloads pushed to connected clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Events an alert producer can push to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertEvent {
    NewAlert { alert: Value },
    AlertDeleted { alert_id: i64 },
    ReactionUpdate { reaction: Value },
    AcknowledgmentUpdate { acknowledgment: Value },
}

impl AlertEvent {
    /// Wire name of the event (the `type` field).
    pub fn event_name(&self) -> &'static str {
        match self {
            AlertEvent::NewAlert { .. } => "new_alert",
            AlertEvent::AlertDeleted { .. } => "alert_deleted",
            AlertEvent::ReactionUpdate { .. } => "reaction_update",
            AlertEvent::AcknowledgmentUpdate { .. } => "acknowledgment_update",
        }
    }
}

/// Frame layout: the tagged event with a delivery timestamp next to it.
#[derive(Serialize)]
struct PayloadFrame<'a> {
    #[serde(flatten)]
    event: &'a AlertEvent,
    timestamp: &'a DateTime<Utc>,
}

/// An immutable alert message ready for delivery.
///
/// The body is serialized once on construction and shared by every channel
/// the payload fans out to. Payloads carry no identity: two payloads with the
/// same content are delivered twice.
#[derive(Debug, Clone)]
pub struct Payload {
    event: AlertEvent,
    timestamp: DateTime<Utc>,
    body: Arc<str>,
}

impl Payload {
    /// Build a payload stamped with the current time.
    pub fn new(event: AlertEvent) -> Result<Self, serde_json::Error> {
        Self::with_timestamp(event, Utc::now())
    }

    pub fn with_timestamp(
        event: AlertEvent,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(&PayloadFrame {
            event: &event,
            timestamp: &timestamp,
        })?;

        Ok(Self {
            event,
            timestamp,
            body: Arc::from(body),
        })
    }

    /// Shorthand for a `new_alert` payload.
    pub fn alert(alert: Value) -> Result<Self, serde_json::Error> {
        Self::new(AlertEvent::NewAlert { alert })
    }

    pub fn event(&self) -> &AlertEvent {
        &self.event
    }

    pub fn event_name(&self) -> &'static str {
        self.event.event_name()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Serialized JSON text written to the wire.
    pub fn body(&self) -> &str {
        &self.body
    }
}
