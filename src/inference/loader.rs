//! Model source resolution
//!
//! Turns a configured path or URL into a validated GGUF file on local disk.

use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::inference::model::{validate_gguf, GgufMetadata};
use crate::storage::huggingface::{download_model_to, format_size};
use crate::storage::get_models_dir;
use crate::types::config::LlmConfig;

/// Where model weights come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A GGUF file already on disk
    Path(PathBuf),
    /// A HuggingFace locator downloaded into the cache on first use
    Url(String),
}

impl ModelSource {
    /// A local path wins over a URL
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match (&config.model_path, &config.model_url) {
            (Some(path), _) => Ok(Self::Path(path.clone())),
            (None, Some(url)) if !url.trim().is_empty() => Ok(Self::Url(url.trim().to_string())),
            _ => Err(RagError::Load(
                "either model_path or model_url must be provided".to_string(),
            )),
        }
    }

    /// Fetch (if remote) and validate the model file
    pub async fn resolve(&self) -> Result<PathBuf> {
        let models_dir = get_models_dir()?;
        self.resolve_in(&models_dir).await
    }

    /// Like [`resolve`](Self::resolve) with an explicit cache directory
    pub async fn resolve_in(&self, models_dir: &Path) -> Result<PathBuf> {
        let path = match self {
            Self::Path(path) => {
                if !path.exists() {
                    return Err(RagError::Load(format!(
                        "model path {} does not exist",
                        path.display()
                    )));
                }
                path.clone()
            }
            Self::Url(url) => {
                download_model_to(url, models_dir, log_progress()).await?
            }
        };

        let GgufMetadata {
            version,
            tensor_count,
            ..
        } = validate_gguf(&path)?;
        tracing::info!(
            "Model file {:?}: GGUF v{}, {} tensors",
            path,
            version,
            tensor_count
        );

        Ok(path)
    }
}

/// Progress callback that logs every 10%
fn log_progress() -> impl Fn(u64, u64) {
    let last_decile = std::cell::Cell::new(0u64);
    move |downloaded, total| {
        if total == 0 {
            return;
        }
        let decile = downloaded * 10 / total;
        if decile > last_decile.get() {
            last_decile.set(decile);
            tracing::info!(
                "Downloaded {} of {} ({}%)",
                format_size(downloaded),
                format_size(total),
                decile * 10
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gguf_bytes() -> Vec<u8> {
        let mut bytes = b"GGUF".to_vec();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes
    }

    #[test]
    fn test_path_takes_precedence() {
        let config = LlmConfig {
            model_path: Some(PathBuf::from("/models/local.gguf")),
            ..Default::default()
        };
        assert_eq!(
            ModelSource::from_config(&config).unwrap(),
            ModelSource::Path(PathBuf::from("/models/local.gguf"))
        );
    }

    #[test]
    fn test_default_config_uses_url() {
        let source = ModelSource::from_config(&LlmConfig::default()).unwrap();
        assert!(matches!(
            source,
            ModelSource::Url(url) if url.ends_with("llama-2-13b-chat.Q4_0.gguf")
        ));
    }

    #[test]
    fn test_no_source_is_a_load_error() {
        let config = LlmConfig {
            model_url: None,
            ..Default::default()
        };
        assert!(matches!(ModelSource::from_config(&config), Err(RagError::Load(_))));

        let config = LlmConfig {
            model_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(ModelSource::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_resolve_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.gguf");
        std::fs::write(&path, gguf_bytes()).unwrap();

        let resolved = ModelSource::Path(path.clone())
            .resolve_in(dir.path())
            .await
            .unwrap();
        assert_eq!(resolved, path);
    }

    #[tokio::test]
    async fn test_resolve_rejects_missing_and_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = ModelSource::Path(dir.path().join("missing.gguf"));
        assert!(matches!(missing.resolve_in(dir.path()).await, Err(RagError::Load(_))));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "not weights").unwrap();
        let unsupported = ModelSource::Path(text);
        assert!(matches!(
            unsupported.resolve_in(dir.path()).await,
            Err(RagError::Model(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_cached_url() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.gguf"), gguf_bytes()).unwrap();

        let source = ModelSource::Url(
            "https://huggingface.co/owner/repo/resolve/main/model.gguf".to_string(),
        );
        let resolved = source.resolve_in(dir.path()).await.unwrap();
        assert_eq!(resolved, dir.path().join("model.gguf"));
    }
}
