//! Message repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use chatis_core::error::{AppError, ErrorKind};
use chatis_core::result::AppResult;
use chatis_core::types::{MessageId, UserId};
use chatis_entity::message::{Message, NewMessage};

use crate::store::MessageStore;

/// Repository for message persistence and conversation queries.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    /// Create a new message repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn append(&self, message: NewMessage) -> AppResult<Message> {
        let file = message.file.as_ref();

        sqlx::query_as::<_, Message>(
            "INSERT INTO messages (id, sender_id, receiver_id, content, \
             file_name, file_media_type, file_size, file_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(MessageId::from_uuid(Uuid::now_v7()))
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(message.content.as_deref())
        .bind(file.map(|f| f.name.as_str()))
        .bind(file.map(|f| f.media_type.as_str()))
        .bind(file.map(|f| f.size))
        .bind(file.map(|f| f.url.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save message", e))
    }

    async fn find_by_id(&self, id: MessageId) -> AppResult<Option<Message>> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find message", e))
    }

    async fn conversation(&self, a: UserId, b: UserId) -> AppResult<Vec<Message>> {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages \
             WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load conversation", e))
    }

    async fn mark_read(&self, sender: UserId, receiver: UserId) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE, read_at = NOW() \
             WHERE sender_id = $1 AND receiver_id = $2 AND is_read = FALSE",
        )
        .bind(sender)
        .bind(receiver)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark messages read", e))?;
        Ok(result.rows_affected())
    }
}
