//! JSON codec for WebSocket events.

use chatis_core::error::AppError;

use super::types::{ClientEvent, ServerEvent};
use super::validator::validate_frame;

/// Parse an inbound frame into a [`ClientEvent`].
///
/// Size, JSON syntax, unknown event names, missing fields, and wrongly
/// typed fields are all reported as protocol errors.
pub fn decode_client_event(raw: &str, max_bytes: usize) -> Result<ClientEvent, AppError> {
    validate_frame(raw, max_bytes)?;
    serde_json::from_str(raw).map_err(|e| AppError::protocol(format!("Malformed event: {e}")))
}

/// Serialize an outbound event.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, AppError> {
    Ok(serde_json::to_string(event)?)
}
