//! CLI configuration file: API URL and bearer token.
//!
//! Stored as JSON at `~/.preview-manager.json`, written by `preview setup`
//! and read by every command that talks to the server.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

/// Path of the config file in the user's home directory.
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".preview-manager.json")
}

/// Loads the config, returning defaults when the file does not exist yet.
pub fn load_config() -> CliConfig {
    let path = config_path();
    match fs::read_to_string(&path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(cfg) => cfg,
            Err(e) => {
                debug!(error = %e, path = %path.display(), "ignoring malformed config file");
                CliConfig::default()
            }
        },
        Err(_) => CliConfig::default(),
    }
}

pub fn save_config(cfg: &CliConfig) -> Result<()> {
    let path = config_path();
    let data = serde_json::to_string_pretty(cfg).context("failed to serialise config")?;
    fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}
