//! Core type definitions used across the Chatis workspace.

pub mod id;

pub use id::*;
