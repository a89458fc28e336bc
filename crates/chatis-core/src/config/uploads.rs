//! File upload configuration.

use serde::{Deserialize, Serialize};

/// Settings for file attachments sent through the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory uploaded files are written to.
    #[serde(default = "default_directory")]
    pub directory: String,
    /// URL prefix the directory is served under.
    #[serde(default = "default_public_path")]
    pub public_path: String,
    /// Maximum size of a single file in bytes.
    #[serde(default = "default_max_size")]
    pub max_file_size_bytes: u64,
    /// Accepted media types.
    #[serde(default = "default_allowed_media_types")]
    pub allowed_media_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            public_path: default_public_path(),
            max_file_size_bytes: default_max_size(),
            allowed_media_types: default_allowed_media_types(),
        }
    }
}

impl UploadConfig {
    /// Whether a media type is on the allow-list.
    pub fn accepts(&self, media_type: &str) -> bool {
        self.allowed_media_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }
}

fn default_directory() -> String {
    "./uploads".to_string()
}

fn default_public_path() -> String {
    "/uploads".to_string()
}

fn default_max_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_media_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "video/mp4",
        "video/mpeg",
        "audio/mpeg",
        "audio/wav",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
