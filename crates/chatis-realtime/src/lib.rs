//! # chatis-realtime
//!
//! Real-time messaging core for Chatis. Provides:
//!
//! - Bearer credential verification at connection time
//! - A process-wide presence registry with a full-snapshot broadcast
//! - The connection router: identity to live connection, best-effort
//!   delivery, message persistence before routing
//! - The JSON event protocol and per-connection lifecycle

pub mod connection;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod router;
pub mod server;

pub use connection::authenticator::{AuthenticatedIdentity, IdentityVerifier};
pub use connection::handle::{CloseReason, ConnectionHandle};
pub use message::types::{ClientEvent, ServerEvent};
pub use presence::registry::PresenceRegistry;
pub use router::{ConnectionRouter, Delivery};
pub use server::{RealtimeEngine, Session};
