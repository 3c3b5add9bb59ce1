//! CLI command implementations.

pub mod clear;
pub mod drain;
pub mod enqueue;
pub mod status;

use outbox_client::{ConnectivityMonitor, ExecutorTable, FileStore, Outbox};
use std::path::Path;
use std::sync::Arc;

use crate::config::CliConfig;

/// Open the persisted queue in `data_dir`.
pub fn open_outbox(
    data_dir: &Path,
    config: &CliConfig,
    executors: ExecutorTable,
    online: bool,
) -> Outbox<FileStore> {
    Outbox::new(
        &config.outbox(),
        config.store(data_dir),
        executors,
        Arc::new(ConnectivityMonitor::new(online)),
    )
}
