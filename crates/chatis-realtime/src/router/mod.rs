//! Connection router: identity to live connection, and event delivery.

pub mod connections;
pub mod dispatch;

pub use connections::{ConnectionRouter, Registration};

/// Outcome of routing one event.
///
/// `Offline` is the defined result of routing to an identity with no
/// registered connection; it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted into the target's outbound queue.
    Delivered,
    /// The target has no registered connection.
    Offline,
    /// The target's queue was full or closed.
    Dropped,
}
