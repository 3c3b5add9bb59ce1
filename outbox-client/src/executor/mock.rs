//! Mock handler for testing.
//!
//! Records every call and allows scripting failures and latency.

use super::{ActionHandler, ExecutorError};
use async_trait::async_trait;
use outbox_types::{ActionId, QueuedAction};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mock handler for testing.
///
/// Clones share state, so a test can keep one handle while the executor
/// table owns another.
#[derive(Debug, Default, Clone)]
pub struct MockHandler {
    inner: Arc<Mutex<MockHandlerInner>>,
}

#[derive(Debug, Default)]
struct MockHandlerInner {
    calls: Vec<QueuedAction>,
    fail_next: u32,
    fail_always: bool,
    error: Option<String>,
    latency: Option<Duration>,
}

impl MockHandler {
    /// Create a handler that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler that always fails with the given error.
    pub fn failing(error: &str) -> Self {
        let handler = Self::new();
        {
            let mut inner = handler.lock();
            inner.fail_always = true;
            inner.error = Some(error.to_string());
        }
        handler
    }

    /// Fail the next `count` calls with the given error, then succeed.
    pub fn fail_next(&self, count: u32, error: &str) {
        let mut inner = self.lock();
        inner.fail_next = count;
        inner.error = Some(error.to_string());
    }

    /// Delay every call by `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Every action this handler was called with, in call order.
    pub fn calls(&self) -> Vec<QueuedAction> {
        self.lock().calls.clone()
    }

    /// Ids of every action this handler was called with, in call order.
    pub fn called_ids(&self) -> Vec<ActionId> {
        self.lock().calls.iter().map(|a| a.id).collect()
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockHandlerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ActionHandler for MockHandler {
    async fn apply(&self, action: &QueuedAction) -> Result<(), ExecutorError> {
        let latency = {
            let mut inner = self.lock();
            inner.calls.push(action.clone());
            inner.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.lock();
        let error = inner.error.clone().unwrap_or_else(|| "mock failure".into());
        if inner.fail_always {
            return Err(ExecutorError::Rejected(error));
        }
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(ExecutorError::Rejected(error));
        }

        Ok(())
    }
}
