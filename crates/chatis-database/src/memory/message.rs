//! In-memory append-only message log.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use chatis_core::result::AppResult;
use chatis_core::types::{MessageId, UserId};
use chatis_entity::message::{Message, NewMessage};

use crate::store::MessageStore;

/// In-memory message store. Insertion order is creation order.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Whether the store holds no messages.
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, message: NewMessage) -> AppResult<Message> {
        // Stamped under the write lock so insertion order matches `created_at`.
        let mut messages = self.messages.write().await;
        let stored = Message {
            id: MessageId::from_uuid(Uuid::now_v7()),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            file: message.file,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: MessageId) -> AppResult<Option<Message>> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn conversation(&self, a: UserId, b: UserId) -> AppResult<Vec<Message>> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, sender: UserId, receiver: UserId) -> AppResult<u64> {
        let now = Utc::now();
        let mut updated = 0;
        for message in self.messages.write().await.iter_mut() {
            if message.sender_id == sender && message.receiver_id == receiver && !message.is_read {
                message.is_read = true;
                message.read_at = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }
}
