//! Individual WebSocket connection handle.

use std::fmt;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

use chatis_core::error::AppError;
use chatis_core::types::{ConnectionId, UserId};
use chatis_entity::user::UserProfile;

use super::authenticator::AuthenticatedIdentity;
use super::lifecycle::{ConnectionState, Lifecycle};
use crate::message::types::ServerEvent;
use crate::router::Delivery;

/// Why a connection was closed by the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed the transport.
    ClientClosed,
    /// The client sent `logout`.
    Logout,
    /// A newer connection registered for the same identity.
    Superseded,
    /// No frame arrived within the heartbeat deadline.
    HeartbeatTimeout,
    /// The outbound channel's reader went away.
    TransportClosed,
    /// The server is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Reason string sent in the close frame.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientClosed => "client closed",
            Self::Logout => "logout",
            Self::Superseded => "superseded",
            Self::HeartbeatTimeout => "heartbeat timeout",
            Self::TransportClosed => "transport closed",
            Self::Shutdown => "server shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handle to a single live connection.
///
/// The router writes to it through a bounded channel; the connection's
/// writer task is the only reader.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// User who owns this connection
    pub user_id: UserId,
    /// Display name (cached for typing events)
    pub display_name: String,
    /// Avatar locator, shown in presence snapshots
    pub avatar: Option<String>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<ServerEvent>,
    lifecycle: Lifecycle,
    cancel: CancellationToken,
    close_reason: OnceLock<CloseReason>,
    last_activity: Mutex<Instant>,
}

impl ConnectionHandle {
    /// Create a handle in the `Connecting` state and the receiving end of its outbound queue.
    pub fn new(
        identity: &AuthenticatedIdentity,
        buffer: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            user_id: identity.user_id,
            display_name: identity.display_name.clone(),
            avatar: identity.avatar.clone(),
            connected_at: Utc::now(),
            sender,
            lifecycle: Lifecycle::new(),
            cancel,
            close_reason: OnceLock::new(),
            last_activity: Mutex::new(Instant::now()),
        };
        (handle, receiver)
    }

    /// Push an event without waiting. A full queue drops the event.
    pub fn send(&self, event: ServerEvent) -> Delivery {
        if self.lifecycle.is_closed() {
            return Delivery::Dropped;
        }
        match self.sender.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    conn_id = %self.id,
                    user_id = %self.user_id,
                    event = event.name(),
                    "Outbound buffer full, dropping event"
                );
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn_id = %self.id, "Outbound channel closed");
                self.close(CloseReason::TransportClosed);
                Delivery::Dropped
            }
        }
    }

    /// Profile of the owning user as shown in presence snapshots.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id,
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.current()
    }

    /// Advance the lifecycle.
    pub fn advance(&self, next: ConnectionState) -> Result<(), AppError> {
        self.lifecycle.advance(next)
    }

    /// Close the connection. The first reason recorded wins.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.close_reason.set(reason);
        if self.lifecycle.close() {
            debug!(conn_id = %self.id, user_id = %self.user_id, %reason, "Connection closing");
        }
        self.cancel.cancel();
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// Reason recorded by [`close`](Self::close), if any.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Resolves once the connection is closed or the server shuts down.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Record inbound activity (any frame, including pongs).
    pub fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    /// Time since the last inbound frame.
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .elapsed()
    }
}
