//! Request DTOs
//!
//! Data structures for alert-source request bodies.

use serde::Deserialize;

use crate::domain::AlertEvent;

/// Broadcast request
///
/// Without `target_roles` (or with `"all"`) the event goes to every live
/// channel.
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub event: AlertEvent,

    #[serde(default)]
    pub target_roles: Option<Vec<String>>,
}
