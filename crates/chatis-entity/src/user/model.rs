//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use chatis_core::types::UserId;

/// A registered chat user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable user identifier.
    pub id: UserId,
    /// Unique login name, also used as the display name.
    pub username: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// Avatar URL (optional).
    pub avatar: Option<String>,
    /// Whether a realtime connection is currently registered.
    pub is_online: bool,
    /// Last connect or disconnect time.
    pub last_seen: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The name shown to other users.
    pub fn display_name(&self) -> &str {
        &self.username
    }

    /// Public profile embedded in message records and presence snapshots.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            display_name: self.username.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Displayable subset of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub display_name: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserProfile {
    /// Profile with no avatar.
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            avatar: None,
        }
    }
}
