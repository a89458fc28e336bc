//! Ping/pong keepalive policy.
//!
//! The writer task of each connection ticks [`HeartbeatConfig::interval`],
//! asks [`pulse`] what to do, and either writes a ping frame or closes the
//! connection.

use std::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};

use chatis_core::config::RealtimeConfig;

use super::handle::ConnectionHandle;

/// Heartbeat configuration
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// Interval between pings
    pub ping_interval: Duration,
    /// Grace period after a missed ping before the connection is dropped
    pub ping_timeout: Duration,
}

impl HeartbeatConfig {
    /// Longest tolerated silence from the client.
    pub fn deadline(&self) -> Duration {
        self.ping_interval + self.ping_timeout
    }

    /// A ticker whose first tick fires one interval from now.
    pub fn interval(&self) -> Interval {
        let period = self.ping_interval.max(Duration::from_millis(1));
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_seconds),
            ping_timeout: Duration::from_secs(config.ping_timeout_seconds),
        }
    }
}

/// What the writer task should do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulse {
    /// Write a ping frame.
    Ping,
    /// The client has been silent past the deadline.
    Expired,
}

/// Decide the heartbeat action for `handle`.
pub fn pulse(handle: &ConnectionHandle, config: &HeartbeatConfig) -> Pulse {
    if handle.idle_for() > config.deadline() {
        Pulse::Expired
    } else {
        Pulse::Ping
    }
}
