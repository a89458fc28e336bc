//! User entity and public profile.

pub mod model;

pub use model::{User, UserProfile};
