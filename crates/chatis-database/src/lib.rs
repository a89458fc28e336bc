//! # chatis-database
//!
//! Store contracts consumed by the realtime core, their PostgreSQL
//! implementations, and process-local in-memory implementations.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::{MessageStore, UserStore};
