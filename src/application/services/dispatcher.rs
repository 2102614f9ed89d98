//! Alert Dispatcher
//!
//! Fans alert payloads out to live channels. Delivery means "placed on the
//! channel's outbound queue"; the session's send activity writes it to the
//! wire later. Nothing here waits on the network.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{ChannelHandle, ChannelId, CloseReason, Payload, UserId};
use crate::infrastructure::metrics;
use crate::infrastructure::registry::ConnectionRegistry;
use crate::shared::error::GatewayError;

/// Outcome of one enqueue attempt on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Payload placed on the channel's outbound queue
    Delivered,
    /// Queue full; the payload was dropped for this channel only
    BackpressureDropped,
    /// Channel closed between lookup and enqueue
    ChannelClosed,
}

impl DeliveryOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::BackpressureDropped => "backpressure",
            DeliveryOutcome::ChannelClosed => "closed",
        }
    }
}

/// Per-channel delivery record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDelivery {
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub outcome: DeliveryOutcome,
}

/// Result of a publish or broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryResult {
    /// No live channel matched; nothing was queued anywhere.
    NoChannel,
    /// One entry per matching channel.
    Dispatched { deliveries: Vec<ChannelDelivery> },
}

impl DeliveryResult {
    pub fn is_no_channel(&self) -> bool {
        matches!(self, DeliveryResult::NoChannel)
    }

    pub fn deliveries(&self) -> &[ChannelDelivery] {
        match self {
            DeliveryResult::NoChannel => &[],
            DeliveryResult::Dispatched { deliveries } => deliveries,
        }
    }

    pub fn outcome_for(&self, channel_id: ChannelId) -> Option<DeliveryOutcome> {
        self.deliveries()
            .iter()
            .find(|d| d.channel_id == channel_id)
            .map(|d| d.outcome)
    }

    pub fn count(&self, outcome: DeliveryOutcome) -> usize {
        self.deliveries()
            .iter()
            .filter(|d| d.outcome == outcome)
            .count()
    }

    pub fn delivered(&self) -> usize {
        self.count(DeliveryOutcome::Delivered)
    }
}

/// Which roles a broadcast targets.
///
/// No roles, or any role equal to `all`, targets everyone. Roles compare
/// case-insensitively and the plural `students` means `student`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleFilter {
    Everyone,
    Roles(HashSet<String>),
}

impl RoleFilter {
    pub fn from_targets<S: AsRef<str>>(targets: Option<&[S]>) -> Self {
        let targets = match targets {
            Some(targets) if !targets.is_empty() => targets,
            _ => return RoleFilter::Everyone,
        };

        let roles: HashSet<String> = targets
            .iter()
            .map(|role| match role.as_ref().to_lowercase().as_str() {
                "students" => "student".to_string(),
                other => other.to_string(),
            })
            .collect();

        if roles.contains("all") {
            RoleFilter::Everyone
        } else {
            RoleFilter::Roles(roles)
        }
    }

    pub fn matches(&self, role: Option<&str>) -> bool {
        match self {
            RoleFilter::Everyone => true,
            RoleFilter::Roles(roles) => role
                .map(|r| roles.contains(&r.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

/// Routes payloads from alert producers to users' live channels.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    /// Close a channel after this many consecutive drops (0 = never)
    max_consecutive_drops: u32,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, max_consecutive_drops: u32) -> Self {
        Self {
            registry,
            max_consecutive_drops,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver a payload to every live channel of one user.
    ///
    /// Each channel is attempted independently. A user with no live channel
    /// gets `NoChannel` and nothing is buffered.
    pub fn publish(&self, user_id: &UserId, payload: Payload) -> DeliveryResult {
        let channels = self.registry.lookup(user_id);
        if channels.is_empty() {
            metrics::record_delivery("no_channel");
            tracing::debug!(
                user_id = %user_id,
                event = payload.event_name(),
                "No live channel for user"
            );
            return DeliveryResult::NoChannel;
        }

        let result = self.deliver(channels, Arc::new(payload));
        tracing::debug!(
            user_id = %user_id,
            recipients = result.deliveries().len(),
            delivered = result.delivered(),
            "Published payload"
        );
        result
    }

    /// Deliver a payload to every live channel whose role matches.
    pub fn broadcast(&self, payload: Payload, filter: &RoleFilter) -> DeliveryResult {
        let channels: Vec<_> = self
            .registry
            .all_channels()
            .into_iter()
            .filter(|channel| filter.matches(channel.role()))
            .collect();

        if channels.is_empty() {
            metrics::record_delivery("no_channel");
            return DeliveryResult::NoChannel;
        }

        let result = self.deliver(channels, Arc::new(payload));
        tracing::debug!(
            recipients = result.deliveries().len(),
            delivered = result.delivered(),
            "Broadcast payload"
        );
        result
    }

    fn deliver(&self, channels: Vec<Arc<ChannelHandle>>, payload: Arc<Payload>) -> DeliveryResult {
        let deliveries = channels
            .iter()
            .map(|channel| {
                let outcome = self.enqueue(channel, Arc::clone(&payload));
                metrics::record_delivery(outcome.metric_label());
                ChannelDelivery {
                    channel_id: channel.id(),
                    user_id: channel.owner().clone(),
                    outcome,
                }
            })
            .collect();

        DeliveryResult::Dispatched { deliveries }
    }

    fn enqueue(&self, channel: &ChannelHandle, payload: Arc<Payload>) -> DeliveryOutcome {
        match channel.try_enqueue(payload) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(GatewayError::Backpressure { drops }) => {
                if self.max_consecutive_drops > 0 && drops >= self.max_consecutive_drops {
                    tracing::warn!(
                        user_id = %channel.owner(),
                        channel_id = %channel.id(),
                        drops,
                        "Disconnecting slow client"
                    );
                    channel.request_close(CloseReason::SlowConsumer);
                } else {
                    tracing::warn!(
                        user_id = %channel.owner(),
                        channel_id = %channel.id(),
                        drops,
                        "Outbound queue full, payload dropped"
                    );
                }
                DeliveryOutcome::BackpressureDropped
            }
            Err(_) => DeliveryOutcome::ChannelClosed,
        }
    }
}
