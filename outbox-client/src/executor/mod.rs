//! Remote executor abstraction for the outbox.
//!
//! The hosting application owns the network calls. It registers one
//! [`ActionHandler`] per [`ActionKind`] in an [`ExecutorTable`]; the sync
//! engine only ever talks to the table.
//!
//! # Design
//!
//! Dispatch is a closed mapping:
//! - a kind with no handler is a normal apply failure, not a panic
//! - every call runs under a deadline, so a hung request cannot stall the
//!   actions queued behind it
//!
//! # Example
//!
//! ```ignore
//! let executors = ExecutorTable::new()
//!     .register(ActionKind::CreateEntity, CreateBot::new(api.clone()))
//!     .register(ActionKind::SendMessage, SendMessage::new(api));
//! ```

mod mock;

pub use mock::MockHandler;

use async_trait::async_trait;
use outbox_types::{ActionKind, QueuedAction};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Executor errors.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// No handler registered for the action's kind.
    #[error("no executor registered for {0}")]
    Unregistered(ActionKind),

    /// The server rejected the mutation.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The request could not be completed.
    #[error("request failed: {0}")]
    Request(String),

    /// The handler did not finish before the deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Performs one kind of mutation against the backend.
///
/// Handlers receive the whole action so they can use its id as an
/// idempotency key; delivery is at-least-once.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Apply the action remotely.
    async fn apply(&self, action: &QueuedAction) -> Result<(), ExecutorError>;
}

/// Dispatch table from action kind to handler.
#[derive(Clone, Default)]
pub struct ExecutorTable {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl ExecutorTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table that routes every kind to the same handler.
    pub fn uniform<H: ActionHandler + 'static>(handler: H) -> Self {
        let shared: Arc<dyn ActionHandler> = Arc::new(handler);
        let mut table = Self::new();
        for kind in ActionKind::ALL {
            table.insert(kind, Arc::clone(&shared));
        }
        table
    }

    /// Register a handler for a kind, replacing any previous one.
    pub fn register<H: ActionHandler + 'static>(mut self, kind: ActionKind, handler: H) -> Self {
        self.insert(kind, Arc::new(handler));
        self
    }

    /// Register a shared handler for a kind, replacing any previous one.
    pub fn insert(&mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Check if a kind has a handler.
    pub fn is_registered(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Run the handler for `action.kind`, bounded by `deadline`.
    pub async fn dispatch(
        &self,
        action: &QueuedAction,
        deadline: Duration,
    ) -> Result<(), ExecutorError> {
        let handler = self
            .handlers
            .get(&action.kind)
            .ok_or(ExecutorError::Unregistered(action.kind))?;

        tokio::time::timeout(deadline, handler.apply(action))
            .await
            .map_err(|_| ExecutorError::Timeout(deadline))?
    }
}

impl fmt::Debug for ExecutorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        f.debug_struct("ExecutorTable")
            .field("registered", &kinds)
            .finish()
    }
}
