//! In-memory store for testing.
//!
//! Records every saved blob and allows injecting failures.

use super::{KeyValueStore, StoreError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory store for testing.
///
/// Clones share the same underlying blob, so a test can keep a handle while
/// the outbox owns another.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    blob: Option<String>,
    history: Vec<String>,
    fail_next_load: Option<String>,
    fail_next_save: Option<String>,
    unavailable: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a blob (e.g. from a previous run).
    pub fn with_blob(blob: &str) -> Self {
        let store = Self::new();
        store.lock().blob = Some(blob.to_string());
        store
    }

    /// The currently stored blob.
    pub fn blob(&self) -> Option<String> {
        self.lock().blob.clone()
    }

    /// Every blob passed to a successful `save()`, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Cause the next `load()` to fail with the given error.
    pub fn fail_next_load(&self, error: &str) {
        self.lock().fail_next_load = Some(error.to_string());
    }

    /// Cause the next `save()` to fail with the given error.
    pub fn fail_next_save(&self, error: &str) {
        self.lock().fail_next_save = Some(error.to_string());
    }

    /// Make every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        let mut inner = self.lock();

        if inner.unavailable {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        if let Some(error) = inner.fail_next_load.take() {
            return Err(StoreError::Unavailable(error));
        }

        Ok(inner.blob.clone())
    }

    fn save(&self, blob: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();

        if inner.unavailable {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        if let Some(error) = inner.fail_next_save.take() {
            return Err(StoreError::Unavailable(error));
        }

        inner.blob = Some(blob.to_string());
        inner.history.push(blob.to_string());
        Ok(())
    }
}
