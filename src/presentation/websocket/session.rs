//! WebSocket Session Supervisor
//!
//! Drives one connection from handshake to teardown:
//!
//! 1. Obtain a credential (query parameter, or an `auth` frame within the
//!    handshake timeout) and verify it against the requested user.
//! 2. Create the channel, open it and register it.
//! 3. Run the receive activity on this task and the send activity on a
//!    spawned task. They share the channel's cancellation signal; whichever
//!    side fails first requests the close and the other side follows.
//! 4. Unregister. A guard does this on every exit path, unwinding included.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};

use super::messages::{ClientFrame, ServerFrame};
use crate::config::WebSocketSettings;
use crate::domain::{
    ChannelHandle, CloseReason, CredentialVerifier, Payload, UserId, VerifiedCredential,
};
use crate::infrastructure::metrics;
use crate::infrastructure::registry::ConnectionRegistry;
use crate::shared::error::GatewayError;

/// Session policy knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub outbound_queue_capacity: usize,
    pub control_queue_capacity: usize,
    pub handshake_timeout: Duration,
    pub idle_timeout: Duration,
    /// Time allowed for the final close frame to be written
    pub close_frame_timeout: Duration,
    pub close_on_credential_expiry: bool,
}

impl From<&WebSocketSettings> for SessionConfig {
    fn from(settings: &WebSocketSettings) -> Self {
        Self {
            outbound_queue_capacity: settings.outbound_queue_capacity,
            control_queue_capacity: settings.control_queue_capacity,
            handshake_timeout: settings.handshake_timeout(),
            idle_timeout: settings.idle_timeout(),
            close_frame_timeout: settings.close_frame_timeout(),
            close_on_credential_expiry: settings.close_on_credential_expiry,
        }
    }
}

/// Verify a token and check it authenticates the requested user.
pub fn authenticate(
    verifier: &dyn CredentialVerifier,
    token: &str,
    requested: &UserId,
) -> Result<VerifiedCredential, GatewayError> {
    let credential = verifier.verify(token)?;
    if &credential.user_id != requested {
        return Err(GatewayError::UserMismatch {
            requested: requested.clone(),
            authenticated: credential.user_id,
        });
    }
    Ok(credential)
}

/// Removes the channel from the registry when dropped.
struct Registration {
    registry: Arc<ConnectionRegistry>,
    channel: Arc<ChannelHandle>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry
            .unregister(self.channel.owner(), self.channel.id());
    }
}

/// Requests an internal close when dropped. A no-op if the channel is
/// already closing.
struct CloseOnDrop(Arc<ChannelHandle>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.request_close(CloseReason::Internal);
    }
}

/// Runs connection sessions against a shared registry.
pub struct SessionSupervisor {
    registry: Arc<ConnectionRegistry>,
    verifier: Arc<dyn CredentialVerifier>,
    config: SessionConfig,
}

impl SessionSupervisor {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        verifier: Arc<dyn CredentialVerifier>,
        config: SessionConfig,
    ) -> Self {
        Self {
            registry,
            verifier,
            config,
        }
    }

    /// Handle an upgraded connection for `requested` until it terminates.
    pub async fn run(&self, mut socket: WebSocket, requested: UserId, token: Option<String>) {
        tracing::debug!(user_id = %requested, "New WebSocket connection");

        let handshake = tokio::select! {
            biased;
            _ = self.registry.closing() => Err(GatewayError::ShuttingDown),
            result = self.handshake(&mut socket, &requested, token) => result,
        };
        let credential = match handshake {
            Ok(credential) => credential,
            Err(e) => {
                tracing::info!(
                    user_id = %requested,
                    reason = e.kind(),
                    error = %e,
                    "Handshake rejected"
                );
                reject(&mut socket, &e).await;
                return;
            }
        };

        let (channel, outbound_rx) = ChannelHandle::new(
            credential.user_id.clone(),
            credential.role.clone(),
            self.config.outbound_queue_capacity,
        );
        channel.open();

        if let Err(e) = self.registry.register(&credential.user_id, Arc::clone(&channel)) {
            if matches!(e, GatewayError::ShuttingDown) {
                tracing::info!(user_id = %credential.user_id, "Refusing channel during shutdown");
            } else {
                tracing::error!(user_id = %credential.user_id, error = %e, "Failed to register channel");
            }
            reject(&mut socket, &e).await;
            return;
        }
        let registration = Registration {
            registry: Arc::clone(&self.registry),
            channel: Arc::clone(&channel),
        };

        let (control_tx, control_rx) = mpsc::channel(self.config.control_queue_capacity);
        let ready = ServerFrame::Ready {
            user_id: credential.user_id.clone(),
            channel_id: channel.id(),
        };
        if control_tx.try_send(ready).is_err() {
            tracing::warn!(channel_id = %channel.id(), "Could not queue ready frame");
        }

        tracing::info!(
            user_id = %credential.user_id,
            channel_id = %channel.id(),
            online = self.registry.count(&credential.user_id),
            "User connected"
        );

        let (sink, stream) = socket.split();
        let send_task = tokio::spawn(send_loop(
            sink,
            outbound_rx,
            control_rx,
            Arc::clone(&channel),
            self.config.close_frame_timeout,
        ));

        let expires_at = self
            .config
            .close_on_credential_expiry
            .then(|| expiry_instant(&credential));

        if let Some(reason) = self
            .receive_loop(stream, &channel, &control_tx, expires_at)
            .await
        {
            channel.request_close(reason);
        }

        if let Err(e) = send_task.await {
            tracing::error!(channel_id = %channel.id(), error = %e, "Send task failed");
        }

        drop(registration);

        tracing::info!(
            user_id = %credential.user_id,
            channel_id = %channel.id(),
            reason = %channel.close_reason().unwrap_or(CloseReason::Internal),
            "User disconnected"
        );
    }

    async fn handshake(
        &self,
        socket: &mut WebSocket,
        requested: &UserId,
        token: Option<String>,
    ) -> Result<VerifiedCredential, GatewayError> {
        let token = match token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => timeout(self.config.handshake_timeout, read_auth_frame(socket))
                .await
                .map_err(|_| GatewayError::HandshakeTimeout)??,
        };

        authenticate(self.verifier.as_ref(), &token, requested)
    }

    /// Receive activity. Returns the close reason, or `None` when the
    /// channel was closed from elsewhere.
    async fn receive_loop(
        &self,
        mut stream: SplitStream<WebSocket>,
        channel: &ChannelHandle,
        control: &mpsc::Sender<ServerFrame>,
        expires_at: Option<Instant>,
    ) -> Option<CloseReason> {
        let expiry = async move {
            match expires_at {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expiry);

        loop {
            let next = tokio::select! {
                biased;
                _ = channel.cancelled() => return None,
                _ = &mut expiry => return Some(CloseReason::CredentialExpired),
                next = timeout(self.config.idle_timeout, stream.next()) => next,
            };

            let message = match next {
                Err(_) => return Some(CloseReason::IdleTimeout),
                Ok(None) => return Some(CloseReason::ReceiveError),
                Ok(Some(Err(e))) => {
                    tracing::debug!(channel_id = %channel.id(), error = %e, "WebSocket error");
                    return Some(CloseReason::ReceiveError);
                }
                Ok(Some(Ok(message))) => message,
            };
            channel.touch();

            match message {
                Message::Text(text) => match ClientFrame::parse(&text) {
                    Ok(ClientFrame::Ping) => {
                        if control.try_send(ServerFrame::pong()).is_err() {
                            tracing::debug!(channel_id = %channel.id(), "Control queue full, pong skipped");
                        }
                    }
                    Ok(ClientFrame::Ack { alert_id }) => {
                        tracing::trace!(channel_id = %channel.id(), alert_id = ?alert_id, "Ack received");
                    }
                    Ok(ClientFrame::Close) => return Some(CloseReason::ClientClosed),
                    Ok(ClientFrame::Auth { .. }) => {
                        tracing::debug!(channel_id = %channel.id(), "Re-authentication ignored");
                    }
                    Err(e) => {
                        tracing::debug!(channel_id = %channel.id(), error = %e, "Malformed frame");
                        return Some(CloseReason::ProtocolViolation);
                    }
                },
                Message::Binary(_) => {
                    tracing::debug!(channel_id = %channel.id(), "Binary frames are not supported");
                    return Some(CloseReason::ProtocolViolation);
                }
                Message::Close(_) => return Some(CloseReason::ClientClosed),
                // Pong replies to pings are handled by axum
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }
}

/// Wait for the client's `auth` frame.
async fn read_auth_frame(socket: &mut WebSocket) -> Result<String, GatewayError> {
    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => match ClientFrame::parse(&text)? {
                ClientFrame::Auth { token } => return Ok(token),
                ClientFrame::Ping => continue,
                _ => return Err(GatewayError::MissingCredential),
            },
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Binary(_)) => {
                return Err(GatewayError::Protocol("binary frames are not supported".into()))
            }
            Ok(Message::Close(_)) => break,
            Err(e) => return Err(GatewayError::Protocol(e.to_string())),
        }
    }
    Err(GatewayError::MissingCredential)
}

/// Close an unauthenticated connection with the error's status.
async fn reject(socket: &mut WebSocket, error: &GatewayError) {
    metrics::record_handshake_rejection(error.kind());
    let frame = CloseFrame {
        code: error.close_code(),
        reason: error.close_reason().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Instant at which the credential stops being valid.
fn expiry_instant(credential: &VerifiedCredential) -> Instant {
    let remaining = (credential.expires_at - Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO);
    Instant::now() + remaining
}

/// Send activity: drains control frames and payloads onto the wire in FIFO
/// order until the channel is cancelled or a write fails.
async fn send_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<Payload>>,
    mut control: mpsc::Receiver<ServerFrame>,
    channel: Arc<ChannelHandle>,
    close_frame_timeout: Duration,
) {
    let _close_on_exit = CloseOnDrop(Arc::clone(&channel));

    loop {
        let message = tokio::select! {
            biased;
            _ = channel.cancelled() => break,
            Some(frame) = control.recv() => match frame.to_text() {
                Ok(text) => Message::Text(text.into()),
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {}", e);
                    continue;
                }
            },
            Some(payload) = outbound.recv() => Message::Text(payload.body().to_owned().into()),
            else => break,
        };

        let written = tokio::select! {
            biased;
            _ = channel.cancelled() => break,
            written = sink.send(message) => written,
        };
        if let Err(e) = written {
            tracing::debug!(channel_id = %channel.id(), error = %e, "WebSocket write failed");
            channel.request_close(CloseReason::SendError);
            break;
        }
    }

    // Release queued payloads before the final frame.
    outbound.close();
    drop(outbound);

    let reason = channel.close_reason();
    if let Some((code, reason)) = reason
        .filter(|r| *r != CloseReason::ClientClosed)
        .and_then(|r| r.close_code().map(|code| (code, r)))
    {
        let frame = CloseFrame {
            code,
            reason: reason.as_str().into(),
        };
        let _ = timeout(close_frame_timeout, sink.send(Message::Close(Some(frame)))).await;
    }
}
