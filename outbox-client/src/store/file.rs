//! File-backed store.
//!
//! The blob lives in `<dir>/<key>.json`. Saves write a sibling temp file,
//! fsync it and rename it over the target, so a crash mid-save leaves
//! either the old blob or the new one, never a torn write.

use super::{KeyValueStore, StoreError};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Store that keeps the blob in a single JSON file.
///
/// `load` and `save` are blocking filesystem calls. The outbox invokes
/// `save` while holding its queue lock, including from the drain task on a
/// tokio worker, so each mutation stalls that worker for one write, fsync
/// and rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Bind a store to `key` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl KeyValueStore for FileStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, blob: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        let mut file = File::create(&temp)?;
        file.write_all(blob.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, &self.path)?;

        Ok(())
    }
}
