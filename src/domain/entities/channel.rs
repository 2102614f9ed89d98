//! Channel entity: one live duplex connection for one client device.
//!
//! A channel is split in two halves. The [`ChannelHandle`] is the shared
//! half: it holds the sending side of the bounded outbound queue, the
//! lifecycle state and the cancellation signal, and is what the registry
//! stores. The receiving side of the queue, the socket and the tasks stay
//! with the session that created the channel.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use super::payload::Payload;
use super::user::UserId;
use crate::shared::error::GatewayError;

/// Unique per-connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(Uuid);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ChannelState {
    Connecting = 0,
    Open = 1,
    Draining = 2,
    Closed = 3,
}

impl ChannelState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Draining,
            _ => Self::Closed,
        }
    }

    /// Whether the channel may still be present in the registry.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Why a channel was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Client sent a close frame or an explicit close request.
    ClientClosed,
    /// Reading from the socket failed or the stream ended.
    ReceiveError,
    /// Writing to the socket failed.
    SendError,
    /// Client sent a malformed frame.
    ProtocolViolation,
    IdleTimeout,
    CredentialExpired,
    /// Too many consecutive payloads dropped on a full queue.
    SlowConsumer,
    ServerShutdown,
    Internal,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::ReceiveError => "receive_error",
            CloseReason::SendError => "send_error",
            CloseReason::ProtocolViolation => "protocol_violation",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::CredentialExpired => "credential_expired",
            CloseReason::SlowConsumer => "slow_consumer",
            CloseReason::ServerShutdown => "server_shutdown",
            CloseReason::Internal => "internal",
        }
    }

    /// WebSocket close code sent to the client, if the socket is still usable.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            CloseReason::ClientClosed => Some(1000),
            CloseReason::IdleTimeout | CloseReason::ServerShutdown => Some(1001),
            CloseReason::ProtocolViolation => Some(1002),
            CloseReason::CredentialExpired | CloseReason::SlowConsumer => Some(1008),
            CloseReason::Internal => Some(1011),
            CloseReason::ReceiveError | CloseReason::SendError => None,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared half of a channel.
///
/// All mutation goes through the methods below; nothing outside this type
/// touches the state word or the queue directly.
#[derive(Debug)]
pub struct ChannelHandle {
    id: ChannelId,
    owner: UserId,
    role: Option<String>,
    connected_at: DateTime<Utc>,
    sender: mpsc::Sender<Arc<Payload>>,
    state: AtomicU8,
    consecutive_drops: AtomicU32,
    last_activity: Mutex<Instant>,
    close_reason: Mutex<Option<CloseReason>>,
    cancel: CancellationToken,
}

impl ChannelHandle {
    /// Create a channel in the `Connecting` state with a bounded outbound
    /// queue of `capacity` payloads.
    pub fn new(
        owner: UserId,
        role: Option<String>,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Arc<Payload>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = Arc::new(Self {
            id: ChannelId::new(),
            owner,
            role,
            connected_at: Utc::now(),
            sender,
            state: AtomicU8::new(ChannelState::Connecting as u8),
            consecutive_drops: AtomicU32::new(0),
            last_activity: Mutex::new(Instant::now()),
            close_reason: Mutex::new(None),
            cancel: CancellationToken::new(),
        });
        (handle, receiver)
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Connecting -> Open. Returns false if the channel already moved on.
    pub fn open(&self) -> bool {
        self.state
            .compare_exchange(
                ChannelState::Connecting as u8,
                ChannelState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Start terminating the channel.
    ///
    /// Records the first reason, moves the channel to `Draining` and fires
    /// the cancellation signal. Only the first call has any effect; it
    /// returns true.
    pub fn request_close(&self, reason: CloseReason) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if matches!(
                ChannelState::from_u8(current),
                ChannelState::Draining | ChannelState::Closed
            ) {
                return false;
            }
            match self.state.compare_exchange(
                current,
                ChannelState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        *self.close_reason.lock() = Some(reason);
        self.cancel.cancel();

        tracing::debug!(
            user_id = %self.owner,
            channel_id = %self.id,
            reason = %reason,
            "Channel close requested"
        );
        true
    }

    /// Final transition to `Closed`. Called by the registry when the
    /// channel is removed; returns true exactly once.
    pub(crate) fn mark_closed(&self) -> bool {
        let previous = self
            .state
            .swap(ChannelState::Closed as u8, Ordering::AcqRel);
        if previous == ChannelState::Closed as u8 {
            return false;
        }
        let mut reason = self.close_reason.lock();
        if reason.is_none() {
            *reason = Some(CloseReason::Internal);
        }
        drop(reason);
        self.cancel.cancel();
        true
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.close_reason.lock()
    }

    /// Enqueue a payload without waiting.
    ///
    /// A full queue drops the payload and counts a consecutive drop; a
    /// successful enqueue resets the count.
    pub fn try_enqueue(&self, payload: Arc<Payload>) -> Result<(), GatewayError> {
        if !matches!(self.state(), ChannelState::Connecting | ChannelState::Open) {
            return Err(GatewayError::ChannelClosed);
        }

        match self.sender.try_send(payload) {
            Ok(()) => {
                self.consecutive_drops.store(0, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                let drops = self.consecutive_drops.fetch_add(1, Ordering::Relaxed) + 1;
                Err(GatewayError::Backpressure { drops })
            }
            Err(TrySendError::Closed(_)) => Err(GatewayError::ChannelClosed),
        }
    }

    pub fn consecutive_drops(&self) -> u32 {
        self.consecutive_drops.load(Ordering::Relaxed)
    }

    /// A channel is degraded while its latest enqueue attempts were dropped.
    pub fn is_degraded(&self) -> bool {
        self.consecutive_drops() > 0
    }

    /// Record client activity.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the channel has been asked to close.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}
