//! Queue an action while offline.

use anyhow::{Context, Result};
use outbox_client::{ActionId, ExecutorTable};
use outbox_types::ActionKind;
use std::path::Path;

use super::open_outbox;
use crate::config::CliConfig;

/// Run the enqueue command.
pub fn run(data_dir: &Path, config: &CliConfig, kind: &str, payload: &str) -> Result<ActionId> {
    let kind: ActionKind = kind.parse()?;
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("Payload is not valid JSON")?;

    let outbox = open_outbox(data_dir, config, ExecutorTable::new(), false);
    let id = outbox.enqueue(kind, payload);

    println!("{id}");
    tracing::info!(action_id = %id, %kind, pending = outbox.pending_count(), "queued");
    Ok(id)
}
