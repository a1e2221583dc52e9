//! Configuration persistence
//!
//! Saves and restores a [`RagConfig`] as pretty-printed JSON.

use std::fs;
use std::path::Path;

use crate::storage::StorageError;
use crate::types::config::RagConfig;

/// Load a configuration file
///
/// A missing file yields the defaults; loaded values are validated.
pub fn load_config(path: &Path) -> Result<RagConfig, StorageError> {
    if !path.exists() {
        tracing::info!("Config file {:?} not found, using defaults", path);
        return Ok(RagConfig::default());
    }

    let json = fs::read_to_string(path)?;
    let mut config: RagConfig = serde_json::from_str(&json)?;
    config.validate();

    tracing::debug!("Loaded config from {:?}", path);
    Ok(config)
}

pub fn save_config(path: &Path, config: &RagConfig) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, serde_json::to_string_pretty(config)?)?;

    tracing::debug!("Saved config to {:?}", path);
    Ok(())
}
