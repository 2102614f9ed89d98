//! Connection Registry
//!
//! Tracks which users currently have live channels.
//!
//! Two sharded maps are kept side by side: an owning store from channel id
//! to channel handle, and an index from user id to the set of that user's
//! channel ids. Channels never point back into the registry, and locking
//! is per shard, so activity for one user does not wait on another user.
//!
//! Lock order is always `users` then `channels`. No method holds a guard
//! across an `.await`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Notify;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::domain::{ChannelHandle, ChannelId, CloseReason, UserId};
use crate::infrastructure::metrics;
use crate::shared::error::GatewayError;

/// Point-in-time registry size, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub active_users: usize,
    pub active_channels: usize,
}

/// Process-wide map of users to their live channels.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Owning store: channel id -> channel
    channels: DashMap<ChannelId, Arc<ChannelHandle>>,
    /// Index: user id -> ids of that user's live channels
    users: DashMap<UserId, HashSet<ChannelId>>,
    /// Signalled whenever the registry becomes empty
    emptied: Notify,
    /// Set by `close_all`; no channel is accepted afterwards
    closing: CancellationToken,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a channel under its owner's entry.
    ///
    /// Re-registering an id that is already present is a no-op and returns
    /// `Ok(false)`. A channel may only be filed under its own owner and only
    /// while it is live. Once [`close_all`](Self::close_all) has run, new
    /// channels are refused with `ShuttingDown`.
    pub fn register(
        &self,
        user_id: &UserId,
        channel: Arc<ChannelHandle>,
    ) -> Result<bool, GatewayError> {
        if channel.owner() != user_id {
            return Err(GatewayError::Internal(format!(
                "channel {} belongs to {}, not {}",
                channel.id(),
                channel.owner(),
                user_id
            )));
        }
        if !channel.state().is_live() {
            return Err(GatewayError::ChannelClosed);
        }
        if self.is_closing() {
            return Err(GatewayError::ShuttingDown);
        }

        let channel_id = channel.id();
        let mut ids = self.users.entry(user_id.clone()).or_default();
        let first_for_user = ids.is_empty();
        if !ids.insert(channel_id) {
            return Ok(false);
        }
        self.channels.insert(channel_id, Arc::clone(&channel));
        drop(ids);

        metrics::CHANNELS_ACTIVE.inc();
        if first_for_user {
            metrics::USERS_ONLINE.inc();
        }

        tracing::info!(
            user_id = %user_id,
            channel_id = %channel_id,
            "Channel registered"
        );

        // close_all may have swept the map between the check above and the
        // insert; the channel must not outlive it.
        if self.is_closing() {
            channel.request_close(CloseReason::ServerShutdown);
        }
        Ok(true)
    }

    /// Remove a channel and close it.
    ///
    /// Drops the user's entry once its last channel is gone. Unknown ids are
    /// ignored. Returns the removed channel, if there was one.
    pub fn unregister(&self, user_id: &UserId, channel_id: ChannelId) -> Option<Arc<ChannelHandle>> {
        let mut user_gone = false;
        let removed = match self.users.entry(user_id.clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get_mut().remove(&channel_id) {
                    return None;
                }
                if entry.get().is_empty() {
                    entry.remove();
                    user_gone = true;
                }
                self.channels.remove(&channel_id).map(|(_, channel)| channel)
            }
            Entry::Vacant(_) => return None,
        };

        metrics::CHANNELS_ACTIVE.dec();
        if user_gone {
            metrics::USERS_ONLINE.dec();
        }

        let channel = removed?;
        channel.mark_closed();
        let reason = channel.close_reason().unwrap_or(CloseReason::Internal);
        metrics::record_channel_closed(reason.as_str());

        tracing::info!(
            user_id = %user_id,
            channel_id = %channel_id,
            reason = %reason,
            "Channel unregistered"
        );

        if self.channels.is_empty() {
            self.emptied.notify_waiters();
        }
        Some(channel)
    }

    /// Snapshot of a user's live channels.
    ///
    /// The returned vector is detached from the registry: later
    /// registrations or removals do not change it.
    pub fn lookup(&self, user_id: &UserId) -> Vec<Arc<ChannelHandle>> {
        let ids: Vec<ChannelId> = match self.users.get(user_id) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Vec::new(),
        };

        ids.iter()
            .filter_map(|id| self.channels.get(id).map(|c| Arc::clone(c.value())))
            .collect()
    }

    /// Number of live channels for a user.
    pub fn count(&self, user_id: &UserId) -> usize {
        self.users.get(user_id).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Check if user is online (has at least one channel)
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.count(user_id) > 0
    }

    /// Snapshot of every live channel.
    pub fn all_channels(&self) -> Vec<Arc<ChannelHandle>> {
        self.channels
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn total_users(&self) -> usize {
        self.users.len()
    }

    pub fn total_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_users: self.total_users(),
            active_channels: self.total_channels(),
        }
    }

    /// Ask every live channel to close and stop accepting new ones. Returns
    /// how many channels accepted the request.
    ///
    /// Channels are removed by their own sessions as they wind down; use
    /// [`drain`](Self::drain) to wait for that.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        self.closing.cancel();

        let closing = self
            .all_channels()
            .into_iter()
            .filter(|channel| channel.request_close(reason))
            .count();

        tracing::info!(channels = closing, reason = %reason, "Closing all channels");
        closing
    }

    /// True once [`close_all`](Self::close_all) has been called.
    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Resolves once [`close_all`](Self::close_all) has been called.
    pub fn closing(&self) -> WaitForCancellationFuture<'_> {
        self.closing.cancelled()
    }

    /// Wait until the registry is empty or `timeout` elapses.
    ///
    /// Returns true if the registry drained in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.emptied.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.channels.is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let empty = self.channels.is_empty();
                if !empty {
                    tracing::warn!(
                        remaining = self.channels.len(),
                        "Registry did not drain before the deadline"
                    );
                }
                return empty;
            }
        }
    }
}
