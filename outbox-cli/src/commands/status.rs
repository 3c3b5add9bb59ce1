//! Show pending actions.

use anyhow::Result;
use chrono::{DateTime, Utc};
use outbox_client::ExecutorTable;
use std::path::Path;

use super::open_outbox;
use crate::config::CliConfig;

/// Run the status command.
pub fn run(data_dir: &Path, config: &CliConfig) -> Result<()> {
    let outbox = open_outbox(data_dir, config, ExecutorTable::new(), false);
    let actions = outbox.snapshot();

    println!("=== outbox status ===");
    println!();
    println!("Store:   {}", config.store(data_dir).path().display());
    println!("Pending: {}", actions.len());

    if actions.is_empty() {
        return Ok(());
    }

    println!();
    let now = Utc::now();
    for action in &actions {
        println!(
            "  {}  {:<14} retries: {}/{}  queued {}",
            action.id,
            action.kind,
            action.retry_count,
            config.queue.max_retries,
            format_age(action.enqueued_at, now)
        );
    }

    Ok(())
}

/// Format the time since `then` as a human-readable string.
fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);

    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{} minutes ago", secs / 60)
    } else if secs < 86400 {
        format!("{} hours ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86400)
    }
}
