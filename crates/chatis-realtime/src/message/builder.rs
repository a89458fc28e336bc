//! Convenience constructors for outbound events.

use chatis_core::error::ErrorKind;
use chatis_core::types::UserId;
use chatis_entity::message::MessageRecord;
use chatis_entity::user::UserProfile;

use super::types::{
    MessageErrorPayload, Notification, NotificationKind, NotificationSender,
    ProtocolErrorPayload, ServerEvent, TypingStarted, TypingStopped,
};

/// Preview text used when a message carries only a file.
pub const FILE_PREVIEW: &str = "Sent a file";

impl ServerEvent {
    /// `users:online` with the given snapshot.
    pub fn users_online(users: Vec<UserProfile>) -> Self {
        Self::UsersOnline(users)
    }

    /// `message:error` with a human-readable reason.
    pub fn message_error(message: impl Into<String>) -> Self {
        Self::MessageError(MessageErrorPayload {
            message: message.into(),
        })
    }

    /// `error` for a frame that never reached the router.
    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::Error(ProtocolErrorPayload {
            code: format!("{}_ERROR", ErrorKind::Protocol),
            message: message.into(),
        })
    }

    /// `typing:start` or `typing:stop` from `user_id`.
    pub fn typing(user_id: UserId, username: &str, starting: bool) -> Self {
        if starting {
            Self::TypingStart(TypingStarted {
                user_id,
                username: username.to_string(),
            })
        } else {
            Self::TypingStop(TypingStopped { user_id })
        }
    }

    /// `notification:new` announcing `record` to its receiver.
    pub fn message_notification(record: &MessageRecord, preview_chars: usize) -> Self {
        Self::NotificationNew(Notification {
            kind: NotificationKind::Message,
            from: NotificationSender {
                id: record.sender.id,
                display_name: record.sender.display_name.clone(),
            },
            content: preview(record.content.as_deref(), preview_chars),
            timestamp: record.created_at,
        })
    }
}

/// First `max_chars` characters of `content`, or [`FILE_PREVIEW`] when there is no text.
pub fn preview(content: Option<&str>, max_chars: usize) -> String {
    match content {
        Some(text) if !text.is_empty() => text.chars().take(max_chars).collect(),
        _ => FILE_PREVIEW.to_string(),
    }
}
