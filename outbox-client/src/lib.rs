//! # outbox-client
//!
//! Offline action queue and sync engine.
//!
//! Applications enqueue mutations while disconnected; the [`Outbox`] persists
//! them and replays them through a table of remote executors once
//! connectivity returns.
//!
//! ## Features
//!
//! - **Write-through persistence**: every queue mutation is saved before it returns
//! - **FIFO replay**: one action at a time, in enqueue order, per drain pass
//! - **Bounded retries**: failed actions are dropped and reported after the cap
//! - **Pluggable seams**: store, executors and connectivity are injected
//! - **Pure core**: uses outbox-core for side-effect-free retry logic
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use outbox_client::{ConnectivityMonitor, ExecutorTable, MemoryStore, Outbox, OutboxConfig};
//!
//! let monitor = Arc::new(ConnectivityMonitor::new(false));
//! let outbox = Outbox::new(&OutboxConfig::default(), MemoryStore::new(), executors, monitor.clone());
//!
//! outbox.update_entity("bot1", json!({"name": "X"}));
//! assert_eq!(outbox.pending_count(), 1);
//!
//! // Replays the queued update in the background
//! monitor.set_online(true);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connectivity;
pub mod executor;
pub mod outbox;
pub mod store;

pub use config::{ConfigError, OutboxConfig, QueueConfig, SyncConfig};
pub use connectivity::ConnectivityMonitor;
pub use executor::{ActionHandler, ExecutorError, ExecutorTable, MockHandler};
pub use outbox::{DrainReport, DroppedAction, Outbox, OutboxEvent, SkipReason};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

pub use outbox_types::{ActionId, ActionKind, OutboxError, QueuedAction};
