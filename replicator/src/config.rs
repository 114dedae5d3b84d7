use std::path::Path;

use anyhow::Context;
use config::shared::ReplicatorConfig;

/// Environment variable naming the configuration file, overridden by the
/// first command line argument when present.
const CONFIG_PATH_ENV_NAME: &str = "REPLICATOR_CONFIG_PATH";

const DEFAULT_CONFIG_PATH: &str = "replicator.json";

/// Resolves the configuration file path from the command line or environment.
pub fn config_path() -> String {
    if let Some(path) = std::env::args().nth(1) {
        return path;
    }

    std::env::var(CONFIG_PATH_ENV_NAME).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Loads and validates the replicator configuration.
///
/// Validation runs here so a broken file stops the service before any
/// connection is opened or job registered.
pub fn load_replicator_config(path: &str) -> anyhow::Result<ReplicatorConfig> {
    let contents = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("failed to read configuration file '{path}'"))?;

    let config: ReplicatorConfig = serde_json::from_str(&contents)
        .with_context(|| format!("configuration file '{path}' is not valid"))?;

    config
        .validate()
        .with_context(|| format!("configuration file '{path}' failed validation"))?;

    Ok(config)
}
