//! Client and server event definitions.
//!
//! Every frame is a JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatis_core::types::UserId;
use chatis_entity::message::{FileDescriptor, MessageRecord};
use chatis_entity::user::UserProfile;

/// Events sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Send a direct message.
    #[serde(rename = "message:send")]
    SendMessage(SendMessagePayload),
    /// The sender started typing to `receiver_id`.
    #[serde(rename = "typing:start")]
    TypingStart(TypingPayload),
    /// The sender stopped typing to `receiver_id`.
    #[serde(rename = "typing:stop")]
    TypingStop(TypingPayload),
    /// Close this connection.
    #[serde(rename = "logout")]
    Logout,
}

impl ClientEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "message:send",
            Self::TypingStart(_) => "typing:start",
            Self::TypingStop(_) => "typing:stop",
            Self::Logout => "logout",
        }
    }
}

/// Payload of `message:send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    /// Recipient.
    pub receiver_id: UserId,
    /// Text content.
    #[serde(default)]
    pub content: Option<String>,
    /// Previously uploaded file.
    #[serde(default)]
    pub file: Option<FileDescriptor>,
}

/// Payload of inbound `typing:start` / `typing:stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    /// The user being typed to.
    pub receiver_id: UserId,
}

/// Events sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full presence snapshot.
    #[serde(rename = "users:online")]
    UsersOnline(Vec<UserProfile>),
    /// A message addressed to this user.
    #[serde(rename = "message:receive")]
    MessageReceive(MessageRecord),
    /// Confirmation that a message sent by this user was persisted.
    #[serde(rename = "message:sent")]
    MessageSent(MessageRecord),
    /// A send failed.
    #[serde(rename = "message:error")]
    MessageError(MessageErrorPayload),
    /// A peer started typing.
    #[serde(rename = "typing:start")]
    TypingStart(TypingStarted),
    /// A peer stopped typing.
    #[serde(rename = "typing:stop")]
    TypingStop(TypingStopped),
    /// New-activity notification.
    #[serde(rename = "notification:new")]
    NotificationNew(Notification),
    /// A frame from this connection could not be understood.
    #[serde(rename = "error")]
    Error(ProtocolErrorPayload),
}

impl ServerEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UsersOnline(_) => "users:online",
            Self::MessageReceive(_) => "message:receive",
            Self::MessageSent(_) => "message:sent",
            Self::MessageError(_) => "message:error",
            Self::TypingStart(_) => "typing:start",
            Self::TypingStop(_) => "typing:stop",
            Self::NotificationNew(_) => "notification:new",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageErrorPayload {
    /// Human-readable reason.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStarted {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStopped {
    pub user_id: UserId,
}

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A direct message arrived.
    Message,
}

/// The sender as shown in a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSender {
    pub id: UserId,
    pub display_name: String,
}

/// Payload of `notification:new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification category.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Who caused it.
    pub from: NotificationSender,
    /// Content preview.
    pub content: String,
    /// When the underlying message was created.
    pub timestamp: DateTime<Utc>,
}

/// Payload of the `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolErrorPayload {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable reason.
    pub message: String,
}
