//! JSON decoding for task API bodies.

use serde::de::DeserializeOwned;

use crate::task::{MessageResponse, Task};

/// Error type for codec decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Decodes an API body from JSON bytes.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes are not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes the body of a list request.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the body is not a JSON array of tasks.
pub fn decode_tasks(bytes: &[u8]) -> Result<Vec<Task>, CodecError> {
    decode(bytes)
}

/// Best-effort extraction of the `message` field of an error body.
///
/// Falls back to the raw body text, and to `None` for an empty body.
#[must_use]
pub fn error_message(bytes: &[u8]) -> Option<String> {
    if let Ok(body) = decode::<MessageResponse>(bytes) {
        return Some(body.message);
    }
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
