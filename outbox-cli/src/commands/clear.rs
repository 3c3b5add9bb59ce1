//! Discard every pending action.

use anyhow::Result;
use outbox_client::ExecutorTable;
use std::path::Path;

use super::open_outbox;
use crate::config::CliConfig;

/// Run the clear command.
pub fn run(data_dir: &Path, config: &CliConfig) -> Result<usize> {
    let outbox = open_outbox(data_dir, config, ExecutorTable::new(), false);
    let removed = outbox.clear();
    println!("Cleared {removed} pending action(s)");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_client::KeyValueStore;
    use tempfile::tempdir;

    #[test]
    fn clear_writes_empty_queue() {
        let dir = tempdir().unwrap();
        let config = CliConfig::default();
        crate::commands::enqueue::run(dir.path(), &config, "create-entity", "{}").unwrap();

        assert_eq!(run(dir.path(), &config).unwrap(), 1);
        assert_eq!(
            config.store(dir.path()).load().unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn clear_empty_queue() {
        let dir = tempdir().unwrap();
        assert_eq!(run(dir.path(), &CliConfig::default()).unwrap(), 0);
    }
}
