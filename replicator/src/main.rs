//! Replicator service binary.
//!
//! Loads a JSON configuration file, wires the configured destination and the
//! per-table checkpoint store, and runs daily guarded sync jobs until a
//! shutdown signal arrives.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{config_path, load_replicator_config};
use crate::core::start_replicator_with_config;

mod config;
mod core;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let path = config_path();
    let replicator_config = load_replicator_config(&path)?;

    info!(config = %path, "replicator configuration loaded");

    if let Err(err) = start_replicator_with_config(replicator_config).await {
        error!(error = %err, "replicator service failed");
        return Err(err);
    }

    info!("replicator service stopped");

    Ok(())
}
