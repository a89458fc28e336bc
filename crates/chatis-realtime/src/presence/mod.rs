//! Process-wide presence tracking.

pub mod registry;

pub use registry::{PresenceChange, PresenceRegistry};
