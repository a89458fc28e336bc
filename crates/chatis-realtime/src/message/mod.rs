//! Real-time event protocol: event types, framing validation, and JSON codec.

pub mod builder;
pub mod serializer;
pub mod types;
pub mod validator;
