//! File attachment descriptor.

use serde::{Deserialize, Serialize};

/// Metadata of an uploaded file attached to a message.
///
/// `url` is the storage locator; it is directly fetchable by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Original file name as uploaded.
    pub name: String,
    /// Media (MIME) type.
    pub media_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Storage locator.
    pub url: String,
}

impl FileDescriptor {
    /// Whether every field carries a usable value.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.media_type.trim().is_empty()
            && !self.url.trim().is_empty()
            && self.size >= 0
    }
}
