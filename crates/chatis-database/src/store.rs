//! Store contracts consumed by the realtime core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use chatis_core::result::AppResult;
use chatis_core::types::{MessageId, UserId};
use chatis_entity::message::{Message, NewMessage};
use chatis_entity::user::User;

/// Identity store: resolves user identities and records presence.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Find a user by ID.
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>>;

    /// List all users ordered by username.
    async fn list_all(&self) -> AppResult<Vec<User>>;

    /// Record online state and last-seen time.
    ///
    /// Updates older than the stored `last_seen` are ignored, so a late
    /// disconnect write never overwrites a newer connect.
    async fn set_presence(&self, id: UserId, online: bool, at: DateTime<Utc>) -> AppResult<()>;
}

/// Durable append-only message store.
///
/// Implementations must be safe under concurrent writers.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Persist a message, assigning its ID and creation time.
    async fn append(&self, message: NewMessage) -> AppResult<Message>;

    /// Find a message by ID.
    async fn find_by_id(&self, id: MessageId) -> AppResult<Option<Message>>;

    /// All messages exchanged between `a` and `b`, oldest first.
    async fn conversation(&self, a: UserId, b: UserId) -> AppResult<Vec<Message>>;

    /// Mark every unread message from `sender` to `receiver` as read.
    ///
    /// Returns the number of messages updated; idempotent.
    async fn mark_read(&self, sender: UserId, receiver: UserId) -> AppResult<u64>;
}
