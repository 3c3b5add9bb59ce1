//! The persisted queue format.
//!
//! The whole queue is stored as one JSON array under a single key. Records
//! keep their enqueue order, so array order is queue order.

use crate::{OutboxError, QueuedAction};

/// Serialize the queue to its persisted JSON form.
pub fn encode_queue(actions: &[QueuedAction]) -> Result<String, OutboxError> {
    serde_json::to_string(actions).map_err(OutboxError::Serialization)
}

/// Deserialize a persisted queue blob.
///
/// The blob must be a JSON array; anything else is rejected so a corrupted
/// store is never half-loaded.
pub fn decode_queue(blob: &str) -> Result<Vec<QueuedAction>, OutboxError> {
    serde_json::from_str(blob).map_err(OutboxError::Deserialization)
}
