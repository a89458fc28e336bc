//! Message entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use chatis_core::error::AppError;
use chatis_core::result::AppResult;
use chatis_core::types::{MessageId, UserId};

use super::file::FileDescriptor;
use crate::user::UserProfile;

/// A persisted direct message. Immutable apart from its read state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID.
    pub id: MessageId,
    /// Author.
    pub sender_id: UserId,
    /// Recipient.
    pub receiver_id: UserId,
    /// Text content (trimmed).
    pub content: Option<String>,
    /// Attached file.
    pub file: Option<FileDescriptor>,
    /// Whether the receiver has read the message.
    pub is_read: bool,
    /// When the receiver read the message.
    pub read_at: Option<DateTime<Utc>>,
    /// Creation time assigned by the store.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether the message belongs to the conversation between `a` and `b`.
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// Resolves sender and receiver into a displayable record.
    pub fn into_record(self, sender: UserProfile, receiver: UserProfile) -> MessageRecord {
        MessageRecord {
            id: self.id,
            sender,
            receiver,
            content: self.content,
            file: self.file,
            is_read: self.is_read,
            read_at: self.read_at,
            created_at: self.created_at,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for Message {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let file_name: Option<String> = row.try_get("file_name")?;
        let file = match file_name {
            Some(name) => Some(FileDescriptor {
                name,
                media_type: row.try_get::<Option<String>, _>("file_media_type")?.unwrap_or_default(),
                size: row.try_get::<Option<i64>, _>("file_size")?.unwrap_or_default(),
                url: row.try_get::<Option<String>, _>("file_url")?.unwrap_or_default(),
            }),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            receiver_id: row.try_get("receiver_id")?,
            content: row.try_get("content")?,
            file,
            is_read: row.try_get("is_read")?,
            read_at: row.try_get("read_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A message accepted for persistence.
///
/// Construction enforces that at least one of content or file is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Author.
    pub sender_id: UserId,
    /// Recipient.
    pub receiver_id: UserId,
    /// Trimmed, non-empty text content.
    pub content: Option<String>,
    /// Attached file.
    pub file: Option<FileDescriptor>,
}

impl NewMessage {
    /// Validates and normalizes a message before it is persisted.
    pub fn new(
        sender_id: UserId,
        receiver_id: UserId,
        content: Option<String>,
        file: Option<FileDescriptor>,
    ) -> AppResult<Self> {
        let content = content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if let Some(file) = &file {
            if !file.is_complete() {
                return Err(AppError::validation("File descriptor is incomplete"));
            }
        }

        if content.is_none() && file.is_none() {
            return Err(AppError::validation("Message content or file is required"));
        }

        Ok(Self {
            sender_id,
            receiver_id,
            content,
            file,
        })
    }
}

/// A message with sender and receiver resolved to profiles.
///
/// This is the "full message record" carried by `message:receive`,
/// `message:sent`, and returned from history queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Message ID.
    pub id: MessageId,
    /// Sender profile.
    pub sender: UserProfile,
    /// Receiver profile.
    pub receiver: UserProfile,
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Attached file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileDescriptor>,
    /// Read flag.
    pub is_read: bool,
    /// Read time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
