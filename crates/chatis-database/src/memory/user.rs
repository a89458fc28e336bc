//! In-memory user store backed by a concurrent map.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use chatis_core::result::AppResult;
use chatis_core::types::UserId;
use chatis_entity::user::User;

use crate::store::UserStore;

/// In-memory identity store.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<UserId, User>,
}

impl MemoryUserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user with the given name and return it.
    pub fn create(&self, username: &str) -> User {
        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            email: None,
            avatar: None,
            is_online: false,
            last_seen: None,
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        user
    }

    /// Remove a user; later lookups report it as missing.
    pub fn remove(&self, id: UserId) -> Option<User> {
        self.users.remove(&id).map(|(_, user)| user)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_all(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn set_presence(&self, id: UserId, online: bool, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(mut user) = self.users.get_mut(&id) {
            if user.last_seen.is_none_or(|seen| seen <= at) {
                user.is_online = online;
                user.last_seen = Some(at);
            }
        }
        Ok(())
    }
}
