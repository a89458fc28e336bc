//! Real-time WebSocket engine configuration.

use serde::{Deserialize, Serialize};

/// What happens to an existing connection when the same identity registers again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersedePolicy {
    /// Leave the superseded connection open; it simply stops receiving routed events.
    Keep,
    /// Close the superseded connection.
    #[default]
    Close,
}

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Bounded outbound queue size per connection.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// WebSocket ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// WebSocket ping timeout in seconds.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_seconds: u64,
    /// Maximum accepted inbound frame size in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Number of characters kept in a notification preview.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// Handling of a superseded connection for the same identity.
    #[serde(default)]
    pub supersede_policy: SupersedePolicy,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: default_channel_buffer(),
            ping_interval_seconds: default_ping_interval(),
            ping_timeout_seconds: default_ping_timeout(),
            max_message_bytes: default_max_message_bytes(),
            preview_chars: default_preview_chars(),
            supersede_policy: SupersedePolicy::default(),
        }
    }
}

fn default_channel_buffer() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    30
}

fn default_ping_timeout() -> u64 {
    10
}

fn default_max_message_bytes() -> usize {
    65_536
}

fn default_preview_chars() -> usize {
    50
}
