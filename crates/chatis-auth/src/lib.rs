//! # chatis-auth
//!
//! JWT bearer credentials: claims, signing, and validation.
//! Credential issuance policy (passwords, login) lives outside the core;
//! the encoder is exposed for operators and tests.

pub mod jwt;

pub use jwt::{Claims, JwtDecoder, JwtEncoder};
