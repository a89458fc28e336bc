//! PostgreSQL implementations of the store contracts.

pub mod message;
pub mod user;

pub use message::MessageRepository;
pub use user::UserRepository;
