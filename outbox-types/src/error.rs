//! Error types for the offline action queue.

use thiserror::Error;

/// Errors that can occur in outbox operations.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// JSON serialization of the queue failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization of the persisted queue failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Unknown action kind tag
    #[error("unknown action kind: {0}")]
    UnknownKind(String),
}
