//! Queued actions - the unit of work buffered while offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::{ActionId, OutboxError};

/// Which remote operation an action replays.
///
/// This is a closed set: a new kind needs both a tag here and an executor
/// registration in the hosting application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Create a new entity (chatbot).
    CreateEntity,
    /// Update fields of an existing entity.
    UpdateEntity,
    /// Delete an entity.
    DeleteEntity,
    /// Send a message to an entity.
    SendMessage,
}

impl ActionKind {
    /// Every kind, in declaration order.
    pub const ALL: [ActionKind; 4] = [
        ActionKind::CreateEntity,
        ActionKind::UpdateEntity,
        ActionKind::DeleteEntity,
        ActionKind::SendMessage,
    ];

    /// The wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateEntity => "create-entity",
            ActionKind::UpdateEntity => "update-entity",
            ActionKind::DeleteEntity => "delete-entity",
            ActionKind::SendMessage => "send-message",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| OutboxError::UnknownKind(s.to_string()))
    }
}

/// One buffered mutation awaiting remote application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    /// Stable identifier, used for removal.
    pub id: ActionId,
    /// The remote operation to invoke.
    pub kind: ActionKind,
    /// Kind-specific data, opaque to the queue.
    pub payload: Value,
    /// When the action was created. Display only, never used for expiry.
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed apply attempts so far.
    pub retry_count: u32,
}

impl QueuedAction {
    /// Create a fresh action with a new id and zero retries.
    pub fn new(kind: ActionKind, payload: Value) -> Self {
        Self {
            id: ActionId::new(),
            kind,
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
        }
    }
}
