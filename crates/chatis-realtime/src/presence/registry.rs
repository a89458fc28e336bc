//! In-memory presence registry with write-through to the identity store.
//!
//! The in-memory view is authoritative for routing and snapshots. Store
//! writes happen separately through [`PresenceRegistry::persist`] so the
//! caller can perform them outside any shared lock; a failed write is
//! logged and does not roll back the in-memory state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::error;

use chatis_core::result::AppResult;
use chatis_core::types::UserId;
use chatis_database::store::UserStore;
use chatis_entity::user::UserProfile;

/// Presence of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    /// Profile broadcast in `users:online`.
    pub profile: UserProfile,
    pub online: bool,
    /// Last connect or disconnect time.
    pub last_seen: DateTime<Utc>,
    /// Start of the current online period.
    pub online_since: Option<DateTime<Utc>>,
}

/// Result of a presence mutation, to be persisted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceChange {
    pub user_id: UserId,
    pub online: bool,
    pub at: DateTime<Utc>,
    /// Whether the online flag actually flipped.
    pub changed: bool,
}

/// Tracks which identities are online.
pub struct PresenceRegistry {
    entries: DashMap<UserId, PresenceEntry>,
    users: Arc<dyn UserStore>,
}

impl std::fmt::Debug for PresenceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceRegistry")
            .field("tracked", &self.entries.len())
            .finish()
    }
}

impl PresenceRegistry {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self {
            entries: DashMap::new(),
            users,
        }
    }

    /// Mark `user_id` online and refresh `last_seen`. Idempotent.
    pub fn mark_online(&self, profile: &UserProfile) -> PresenceChange {
        let at = Utc::now();
        let user_id = profile.id;
        let mut entry = self.entries.entry(user_id).or_insert_with(|| PresenceEntry {
            profile: profile.clone(),
            online: false,
            last_seen: at,
            online_since: None,
        });
        let changed = !entry.online;
        entry.profile = profile.clone();
        entry.online = true;
        entry.last_seen = at;
        if changed {
            entry.online_since = Some(at);
        }
        PresenceChange {
            user_id,
            online: true,
            at,
            changed,
        }
    }

    /// Mark `user_id` offline and set `last_seen` to now. Idempotent.
    pub fn mark_offline(&self, user_id: UserId) -> PresenceChange {
        let at = Utc::now();
        let changed = match self.entries.get_mut(&user_id) {
            Some(mut entry) => {
                let changed = entry.online;
                entry.online = false;
                entry.online_since = None;
                entry.last_seen = at;
                changed
            }
            None => false,
        };
        PresenceChange {
            user_id,
            online: false,
            at,
            changed,
        }
    }

    /// Online identities, longest online first, ties broken by ID.
    pub fn list_online(&self) -> Vec<UserProfile> {
        let mut online: Vec<(DateTime<Utc>, UserProfile)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let since = entry.online_since.filter(|_| entry.online)?;
                Some((since, entry.profile.clone()))
            })
            .collect();
        online.sort_by(|(a_since, a), (b_since, b)| a_since.cmp(b_since).then(a.id.cmp(&b.id)));
        online.into_iter().map(|(_, profile)| profile).collect()
    }

    /// Whether `user_id` is online.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.entries.get(&user_id).is_some_and(|e| e.online)
    }

    /// Last connect or disconnect time seen by this process.
    pub fn last_seen(&self, user_id: UserId) -> Option<DateTime<Utc>> {
        self.entries.get(&user_id).map(|e| e.last_seen)
    }

    /// Number of online identities.
    pub fn online_count(&self) -> usize {
        self.entries.iter().filter(|e| e.online).count()
    }

    /// Write `change` to the identity store.
    ///
    /// Failures are logged and returned; the in-memory view is kept.
    pub async fn persist(&self, change: &PresenceChange) -> AppResult<()> {
        self.users
            .set_presence(change.user_id, change.online, change.at)
            .await
            .inspect_err(|e| {
                error!(
                    user_id = %change.user_id,
                    online = change.online,
                    error = %e,
                    "Failed to persist presence"
                );
            })
    }
}
