//! Persistent store abstraction for the outbox.
//!
//! The queue is persisted as one serialized blob under one fixed key. The
//! engine only needs to read that blob at startup and overwrite it after
//! every mutation, so the store contract is two calls:
//! - `load()` returns the blob, or `None` if nothing was ever saved
//! - `save()` replaces the blob
//!
//! Both are synchronous: a save completes before the mutation that caused
//! it returns, which keeps memory and storage in step.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage is unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the blob failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value store holding the serialized queue.
///
/// Implementations are bound to a single key when constructed.
pub trait KeyValueStore: Send + Sync {
    /// Read the stored blob, if any.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Overwrite the stored blob.
    fn save(&self, blob: &str) -> Result<(), StoreError>;
}
