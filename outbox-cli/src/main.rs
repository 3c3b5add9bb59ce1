//! # outbox
//!
//! CLI tool for inspecting and replaying an offline action queue.
//!
//! ## Commands
//!
//! - `enqueue`: Queue an action while offline
//! - `status`: Show pending actions
//! - `clear`: Discard every pending action
//! - `drain`: Go online and replay the queue against an HTTP backend
//!
//! ## Example
//!
//! ```bash
//! # Queue an update while offline
//! outbox enqueue update-entity '{"id": "bot1", "name": "X"}'
//!
//! # Inspect the queue
//! outbox status
//!
//! # Replay against the dashboard API
//! outbox drain --base-url http://localhost:3000/api
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod http;

use commands::{clear, drain, enqueue, status};
use config::CliConfig;

/// CLI tool for inspecting and replaying an offline action queue.
#[derive(Parser, Debug)]
#[command(name = "outbox")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the persisted queue
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue an action while offline
    Enqueue {
        /// Action kind (create-entity, update-entity, delete-entity, send-message)
        kind: String,

        /// JSON payload
        payload: String,
    },

    /// Show pending actions
    Status,

    /// Discard every pending action
    Clear,

    /// Go online and replay the queue once
    Drain {
        /// API base URL (overrides [remote] base_url)
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    match cli.command {
        Commands::Enqueue { kind, payload } => {
            enqueue::run(&data_dir, &config, &kind, &payload)?;
        }
        Commands::Status => {
            status::run(&data_dir, &config)?;
        }
        Commands::Clear => {
            clear::run(&data_dir, &config)?;
        }
        Commands::Drain { base_url } => {
            let base_url = base_url.unwrap_or_else(|| config.remote.base_url.clone());
            drain::run(&data_dir, &config, &base_url).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for the outbox CLI.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "outbox")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
