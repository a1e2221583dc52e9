//! Local storage
//!
//! Resolves the per-user directories used to cache downloaded model files.

pub mod huggingface;
pub mod settings;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Could not determine a home directory for this user")]
    NoProjectDirs,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn project_dirs() -> Result<directories::ProjectDirs, StorageError> {
    // Linux: ~/.cache/localrag
    // macOS: ~/Library/Caches/com.localrag.localrag
    // Windows: %LOCALAPPDATA%\localrag\localrag\cache
    directories::ProjectDirs::from("com", "localrag", "localrag").ok_or(StorageError::NoProjectDirs)
}

/// Get the directory where downloaded models are cached
pub fn get_models_dir() -> Result<PathBuf, StorageError> {
    Ok(project_dirs()?.cache_dir().join("models"))
}
