//! Server configuration file (YAML, camelCase keys). Every field is optional; CLI flags win.

use crate::error::{Result, ServerError};
use apiscope_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Directory scanned for `*.json`, `*.yaml`, `*.yml` specs.
    #[serde(default)]
    pub specs_dir: Option<PathBuf>,

    #[serde(default)]
    pub engine: EngineConfig,
}

/// Load a config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid YAML for [`ServerConfig`].
pub fn load_config(path: &Path) -> Result<ServerConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ServerError::Config(format!("failed to read config '{}': {e}", path.display()))
    })?;
    if content.trim().is_empty() {
        return Ok(ServerConfig::default());
    }
    let cfg: ServerConfig = serde_yaml::from_str(&content).map_err(|e| {
        ServerError::Config(format!("failed to parse config '{}': {e}", path.display()))
    })?;

    // Relative spec directories are relative to the config file.
    let specs_dir = cfg.specs_dir.map(|dir| match path.parent() {
        Some(parent) if dir.is_relative() => parent.join(dir),
        _ => dir,
    });

    Ok(ServerConfig { specs_dir, ..cfg })
}
