//! Configuration for the outbox.
//!
//! Configuration is loaded from a TOML file, every key optional:
//!
//! ```toml
//! [queue]
//! storage_key = "offline-action-queue"
//! max_retries = 3
//!
//! [sync]
//! apply_timeout_ms = 30000
//! drain_on_enqueue = true
//! ```

use outbox_core::{RetryPolicy, DEFAULT_MAX_RETRIES};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the outbox.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutboxConfig {
    /// Queue and persistence configuration.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Drain behaviour configuration.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Queue and persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Fixed key the serialized queue is stored under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Failed attempts after which an action is dropped (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Drain behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Deadline for a single remote apply in milliseconds (default: 30000).
    /// A call that exceeds it counts as a failed attempt.
    #[serde(default = "default_apply_timeout_ms")]
    pub apply_timeout_ms: u64,
    /// Start a drain right after enqueue when online (default: true).
    #[serde(default = "default_drain_on_enqueue")]
    pub drain_on_enqueue: bool,
}

// Default value functions
fn default_storage_key() -> String {
    "offline-action-queue".to_string()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_apply_timeout_ms() -> u64 {
    30_000 // 30 seconds
}

fn default_drain_on_enqueue() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            apply_timeout_ms: default_apply_timeout_ms(),
            drain_on_enqueue: default_drain_on_enqueue(),
        }
    }
}

impl OutboxConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid("queue.storage_key must not be empty".into()));
        }
        if self.queue.max_retries == 0 {
            return Err(ConfigError::Invalid("queue.max_retries must be at least 1".into()));
        }
        if self.sync.apply_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync.apply_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Set the retry cap.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.queue.max_retries = max_retries;
        self
    }

    /// Set the storage key.
    pub fn with_storage_key(mut self, key: &str) -> Self {
        self.queue.storage_key = key.to_string();
        self
    }

    /// Set the per-call deadline. Sub-millisecond values round up to 1ms.
    pub fn with_apply_timeout(mut self, timeout: Duration) -> Self {
        self.sync.apply_timeout_ms = u64::try_from(timeout.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }

    /// Enable or disable the drain that follows an online enqueue.
    pub fn with_drain_on_enqueue(mut self, enabled: bool) -> Self {
        self.sync.drain_on_enqueue = enabled;
        self
    }

    /// Deadline for a single remote apply.
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.apply_timeout_ms)
    }

    /// Retry policy derived from the cap.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.queue.max_retries)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Configuration parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
