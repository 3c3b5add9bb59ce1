//! Identity types for queued actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::OutboxError;

/// A unique identifier for a queued action.
///
/// UUID v4 format, serialized as its hyphenated string form. Assigned once
/// at enqueue time and never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(uuid::Uuid);

impl ActionId {
    /// Create a new random ActionId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ActionId {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| OutboxError::InvalidData(format!("invalid action id {s:?}: {e}")))
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionId({})", self.0)
    }
}
