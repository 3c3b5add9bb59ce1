//! Configuration management for the outbox CLI.

use anyhow::{Context, Result};
use outbox_client::{FileStore, OutboxConfig, QueueConfig, SyncConfig};
use serde::Deserialize;
use std::path::Path;

/// CLI configuration: the library sections plus the backend location.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    /// Queue and persistence configuration.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Drain behaviour configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Backend the HTTP executor talks to.
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// API base URL, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.outbox().validate()?;
        Ok(config)
    }

    /// The library configuration. The CLI never drains on enqueue.
    pub fn outbox(&self) -> OutboxConfig {
        OutboxConfig {
            queue: self.queue.clone(),
            sync: self.sync.clone(),
        }
        .with_drain_on_enqueue(false)
    }

    /// The file store for the queue under `data_dir`.
    pub fn store(&self, data_dir: &Path) -> FileStore {
        FileStore::new(data_dir, &self.queue.storage_key)
    }
}
