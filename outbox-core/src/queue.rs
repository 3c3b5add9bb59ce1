//! Action queue for the offline outbox.
//!
//! This module provides the in-memory ordered sequence of pending actions:
//! - FIFO ordering by enqueue time
//! - Removal by id (actions leave from anywhere, not only the front)
//! - Retry metadata updates in place
//!
//! The queue itself never touches storage. `outbox-client` persists the
//! full queue after every mutation made through this type.

use std::collections::VecDeque;

use outbox_types::{ActionId, ActionKind, QueuedAction};
use serde_json::Value;

/// Ordered queue of pending actions.
///
/// Actions flow through the queue in this order:
/// 1. `push()` - append to the back
/// 2. `snapshot()` - copied out by a drain pass
/// 3. `remove()` - deleted once applied or dropped
///
/// Failed attempts update `retry_count` in place without moving the action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionQueue {
    actions: VecDeque<QueuedAction>,
}

impl ActionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from previously persisted actions, keeping their order.
    pub fn from_actions(actions: Vec<QueuedAction>) -> Self {
        Self {
            actions: actions.into(),
        }
    }

    /// Build a new action and append it. Returns the new action's id.
    pub fn enqueue(&mut self, kind: ActionKind, payload: Value) -> ActionId {
        let action = QueuedAction::new(kind, payload);
        let id = action.id;
        self.push(action);
        id
    }

    /// Append an existing action to the back of the queue.
    pub fn push(&mut self, action: QueuedAction) {
        self.actions.push_back(action);
    }

    /// Copy of every action in queue order.
    pub fn snapshot(&self) -> Vec<QueuedAction> {
        self.actions.iter().cloned().collect()
    }

    /// Look up an action by id.
    pub fn get(&self, id: &ActionId) -> Option<&QueuedAction> {
        self.actions.iter().find(|a| a.id == *id)
    }

    /// Remove an action by id.
    ///
    /// Returns the removed action, or `None` if it was not queued.
    pub fn remove(&mut self, id: &ActionId) -> Option<QueuedAction> {
        let index = self.actions.iter().position(|a| a.id == *id)?;
        self.actions.remove(index)
    }

    /// Overwrite the retry count of a queued action.
    ///
    /// Returns false if the action is no longer queued.
    pub fn set_retry_count(&mut self, id: &ActionId, retry_count: u32) -> bool {
        match self.actions.iter_mut().find(|a| a.id == *id) {
            Some(action) => {
                action.retry_count = retry_count;
                true
            }
            None => false,
        }
    }

    /// Number of queued actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Remove every action. Returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let removed = self.actions.len();
        self.actions.clear();
        removed
    }
}
