//! Frame-level checks applied before an inbound frame is parsed.

use chatis_core::error::AppError;

/// Validates a raw inbound text frame.
pub fn validate_frame(raw: &str, max_bytes: usize) -> Result<(), AppError> {
    if raw.len() > max_bytes {
        return Err(AppError::protocol(format!(
            "Event exceeds maximum size of {max_bytes} bytes"
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::protocol("Empty event"));
    }

    Ok(())
}
