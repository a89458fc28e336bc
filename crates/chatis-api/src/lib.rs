//! # chatis-api
//!
//! HTTP layer for Chatis built on Axum.
//!
//! Hosts the WebSocket upgrade that feeds the real-time engine, plus the
//! collaborator endpoints around it: user listing, conversation history,
//! read-state updates, file upload, and static serving of uploads.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
