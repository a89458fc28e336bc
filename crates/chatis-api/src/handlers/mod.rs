//! Request handlers.

pub mod health;
pub mod message;
pub mod upload;
pub mod user;
pub mod ws;
