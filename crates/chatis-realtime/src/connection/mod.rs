//! Connection-scoped pieces: identity verification, handles, lifecycle, heartbeat.

pub mod authenticator;
pub mod handle;
pub mod heartbeat;
pub mod lifecycle;
