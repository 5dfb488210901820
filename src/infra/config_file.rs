// ============================================================
// Layer 6: Run Config File
// ============================================================
// Reads the optional --config JSON file. Missing keys fall back
// to the defaults in domain::params; no file means all defaults.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::params::RunConfig;

pub fn load_run_config(path: Option<&Path>) -> Result<RunConfig> {
    let config = match path {
        None => {
            tracing::info!("No config file given, using built-in defaults");
            RunConfig::default()
        }
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
            let config: RunConfig = serde_json::from_str(&json)
                .with_context(|| format!("Invalid run config in '{}'", path.display()))?;
            tracing::info!("Loaded run config from '{}'", path.display());
            config
        }
    };
    config.validate()?;
    Ok(config)
}
