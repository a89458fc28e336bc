//! # chatis-entity
//!
//! Domain entity models for Chatis. Database entities derive or implement
//! `sqlx::FromRow`; everything that crosses the wire serializes with
//! camelCase field names.

pub mod message;
pub mod user;
