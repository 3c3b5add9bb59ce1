//! Go online and replay the queue once.

use anyhow::Result;
use outbox_client::{DrainReport, ExecutorTable, SkipReason};
use std::path::Path;

use super::open_outbox;
use crate::config::CliConfig;
use crate::http::HttpExecutor;

/// Run the drain command.
pub async fn run(data_dir: &Path, config: &CliConfig, base_url: &str) -> Result<DrainReport> {
    let executor = HttpExecutor::new(base_url)?;
    let outbox = open_outbox(data_dir, config, ExecutorTable::uniform(executor), true);

    println!("Draining {} action(s) against {base_url}...", outbox.pending_count());
    let report = outbox.drain().await;
    print_report(&report, outbox.pending_count());

    Ok(report)
}

fn print_report(report: &DrainReport, remaining: usize) {
    match report.skipped {
        Some(SkipReason::Empty) => {
            println!("Nothing to do.");
            return;
        }
        Some(reason) => {
            println!("Drain skipped: {reason:?}");
            return;
        }
        None => {}
    }

    println!("  Applied: {}", report.applied.len());
    println!("  Retried: {}", report.retried.len());
    println!("  Dropped: {}", report.dropped.len());
    println!("  Pending: {remaining}");

    for dropped in &report.dropped {
        println!();
        println!("Lost offline edit {} ({}):", dropped.id, dropped.kind);
        println!("  {}", dropped.reason);
    }
}
