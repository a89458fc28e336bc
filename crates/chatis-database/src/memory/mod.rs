//! Process-local store implementations.
//!
//! Used for `database.backend = "memory"` and throughout the test suites.

pub mod message;
pub mod user;

pub use message::MemoryMessageStore;
pub use user::MemoryUserStore;
