//! WebDAV Backup Tool
//!
//! Archives directories and dumps databases straight into a WebDAV store,
//! pruning backups that fell out of the retention window.

// backup-dav/src/main.rs
mod backup;
mod config;
mod errors;
mod utils;
mod webdav;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use config::BackupConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// The whole run, uploads included, must finish within this window.
const WATCHDOG: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Parser)]
#[command(name = "backup-dav", version, about = "Back up directories and databases to a WebDAV store")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

/// Main entry point for the backup tool
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match tokio::time::timeout(WATCHDOG, run_app(&cli)).await {
        Ok(Ok(true)) => {
            info!("✅ Backup completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(Ok(false)) => {
            error!("❌ Backup finished with failed stages.");
            ExitCode::FAILURE
        }
        Ok(Err(e)) => {
            error!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("❌ Backup did not finish within {} hours, giving up", WATCHDOG.as_secs() / 3600);
            // Do not wait for blocking compressor threads during runtime shutdown.
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Returns whether every backup stage succeeded.
async fn run_app(cli: &Cli) -> Result<bool> {
    if let Err(e) = dotenv::dotenv() {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }

    let config = BackupConfig::load_from_json(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    info!(
        "🚀 Starting backup '{}' to {}{}",
        config.name, config.remote.endpoint_url, config.remote.path
    );

    let client = webdav::WebDavClient::new(&config.remote)?;
    let summary = backup::run_backup_flow(&config, &client, &backup::ProcessProducer)
        .await
        .context("Backup process failed")?;

    if summary.pruned.deleted > 0 || summary.pruned.failed > 0 {
        info!(
            "Retention: {} old backups removed, {} could not be removed",
            summary.pruned.deleted, summary.pruned.failed
        );
    }
    for stage in &summary.stages {
        let mark = if stage.succeeded { "✓" } else { "✗" };
        info!("{} {} ({} attempts)", mark, stage.label, stage.attempts);
    }
    Ok(summary.succeeded())
}
