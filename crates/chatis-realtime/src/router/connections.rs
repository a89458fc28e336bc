//! Identity to connection map and best-effort routing.

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use tracing::{debug, info};

use chatis_core::config::{RealtimeConfig, SupersedePolicy};
use chatis_core::types::{ConnectionId, UserId};
use chatis_database::store::{MessageStore, UserStore};

use super::Delivery;
use crate::connection::handle::{CloseReason, ConnectionHandle};
use crate::message::types::ServerEvent;
use crate::metrics::RealtimeMetrics;
use crate::presence::{PresenceChange, PresenceRegistry};

/// Result of [`ConnectionRouter::register`].
#[derive(Debug)]
pub struct Registration {
    /// Presence update to persist.
    pub presence: PresenceChange,
    /// Handle previously registered for the same identity.
    pub superseded: Option<Arc<ConnectionHandle>>,
}

/// Routes events to the single registered connection of each identity.
///
/// Registration and removal are serialized by a membership lock that also
/// covers the presence update and the snapshot broadcast, so every
/// connection observes snapshots in the order membership changed. Routing
/// reads the map without that lock and never waits.
pub struct ConnectionRouter {
    connections: DashMap<UserId, Arc<ConnectionHandle>>,
    membership: Mutex<()>,
    pub(crate) presence: Arc<PresenceRegistry>,
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) messages: Arc<dyn MessageStore>,
    pub(crate) metrics: Arc<RealtimeMetrics>,
    supersede_policy: SupersedePolicy,
    pub(crate) preview_chars: usize,
}

impl std::fmt::Debug for ConnectionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRouter")
            .field("connections", &self.connections.len())
            .field("supersede_policy", &self.supersede_policy)
            .finish()
    }
}

impl ConnectionRouter {
    /// Creates an empty router.
    pub fn new(
        config: &RealtimeConfig,
        presence: Arc<PresenceRegistry>,
        users: Arc<dyn UserStore>,
        messages: Arc<dyn MessageStore>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            connections: DashMap::new(),
            membership: Mutex::new(()),
            presence,
            users,
            messages,
            metrics,
            supersede_policy: config.supersede_policy,
            preview_chars: config.preview_chars,
        }
    }

    fn lock_membership(&self) -> MutexGuard<'_, ()> {
        self.membership
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bind the handle's identity to it, last registration wins.
    ///
    /// Marks the identity online and broadcasts the full presence snapshot
    /// to every registered connection, including this one.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> Registration {
        let _guard = self.lock_membership();

        let superseded = self
            .connections
            .insert(handle.user_id, Arc::clone(&handle))
            .filter(|previous| previous.id != handle.id);

        if let Some(previous) = &superseded {
            match self.supersede_policy {
                SupersedePolicy::Close => previous.close(CloseReason::Superseded),
                SupersedePolicy::Keep => {}
            }
            info!(
                user_id = %handle.user_id,
                old_conn_id = %previous.id,
                new_conn_id = %handle.id,
                policy = ?self.supersede_policy,
                "Connection superseded"
            );
        }

        let presence = self.presence.mark_online(&handle.profile());
        self.broadcast_presence();

        Registration {
            presence,
            superseded,
        }
    }

    /// Remove the binding for `user_id` if `conn_id` still owns it.
    ///
    /// A stale connection (already superseded) gets `None` and changes
    /// nothing. Otherwise the identity goes offline and the snapshot is
    /// broadcast to the remaining connections.
    pub fn unregister(&self, user_id: UserId, conn_id: ConnectionId) -> Option<PresenceChange> {
        let _guard = self.lock_membership();

        if self
            .connections
            .remove_if(&user_id, |_, current| current.id == conn_id)
            .is_none()
        {
            debug!(%user_id, %conn_id, "Stale unregister ignored");
            return None;
        }

        let change = self.presence.mark_offline(user_id);
        self.broadcast_presence();
        Some(change)
    }

    /// Deliver `event` to `target`'s connection, if any. Never waits.
    pub fn route(&self, target: UserId, event: ServerEvent) -> Delivery {
        let Some(handle) = self.current(target) else {
            debug!(user_id = %target, event = event.name(), "Recipient offline, event not routed");
            self.metrics.record_miss();
            return Delivery::Offline;
        };
        let delivery = handle.send(event);
        self.record(delivery);
        delivery
    }

    /// Deliver `event` on a specific connection.
    pub fn deliver(&self, handle: &ConnectionHandle, event: ServerEvent) -> Delivery {
        let delivery = handle.send(event);
        self.record(delivery);
        delivery
    }

    /// The connection currently registered for `user_id`.
    pub fn current(&self, user_id: UserId) -> Option<Arc<ConnectionHandle>> {
        self.connections
            .get(&user_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Close every registered connection.
    pub fn close_all(&self, reason: CloseReason) {
        for entry in self.connections.iter() {
            entry.value().close(reason);
        }
    }

    fn broadcast_presence(&self) {
        let snapshot = self.presence.list_online();
        for entry in self.connections.iter() {
            let delivery = entry.value().send(ServerEvent::users_online(snapshot.clone()));
            self.record(delivery);
        }
    }

    fn record(&self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.metrics.record_delivered(),
            Delivery::Dropped => self.metrics.record_dropped(),
            Delivery::Offline => self.metrics.record_miss(),
        }
    }
}
