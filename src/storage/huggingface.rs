//! HuggingFace model downloader
//!
//! Resolves HuggingFace locators to GGUF files and caches them under the models directory.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{RagError, Result};

const HF_BASE: &str = "https://huggingface.co";

/// A file inside a HuggingFace repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuggingFaceUrl {
    pub repo_id: String,
    /// Empty when the locator names a repository only
    pub filename: String,
    pub revision: String,
}

impl HuggingFaceUrl {
    /// Parse a HuggingFace locator
    ///
    /// Accepted forms:
    /// 1. `https://huggingface.co/owner/repo/resolve/main/model.gguf`
    /// 2. `https://huggingface.co/owner/repo/blob/main/model.gguf`
    /// 3. `owner/repo/model.gguf`
    /// 4. `owner/repo`
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let url = url.split('?').next().unwrap_or(url);
        let url = url.split('#').next().unwrap_or(url);

        let path = url
            .strip_prefix("https://huggingface.co/")
            .or_else(|| url.strip_prefix("http://huggingface.co/"));

        if let Some(path) = path {
            let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
            if parts.len() < 2 {
                return Err(RagError::Download(format!("Invalid HuggingFace URL: {url}")));
            }
            let repo_id = format!("{}/{}", parts[0], parts[1]);

            if let Some(pos) = parts.iter().position(|&p| p == "blob" || p == "resolve") {
                if parts.len() > pos + 2 {
                    return Ok(Self {
                        repo_id,
                        filename: parts[pos + 2..].join("/"),
                        revision: parts[pos + 1].to_string(),
                    });
                }
            }

            return Ok(Self {
                repo_id,
                filename: String::new(),
                revision: "main".to_string(),
            });
        }

        if url.contains("://") {
            return Err(RagError::Download(format!("Not a HuggingFace URL: {url}")));
        }

        let parts: Vec<&str> = url.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() < 2 {
            return Err(RagError::Download(format!("Could not parse HuggingFace locator: {url}")));
        }

        Ok(Self {
            repo_id: format!("{}/{}", parts[0], parts[1]),
            filename: parts[2..].join("/"),
            revision: "main".to_string(),
        })
    }

    pub fn download_url(&self) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            HF_BASE, self.repo_id, self.revision, self.filename
        )
    }
}

fn sanitize_local_filename(filename: &str) -> Result<String> {
    let trimmed = filename.trim().trim_start_matches('/');
    let flattened = trimmed.replace('\\', "/").replace('/', "__");

    let mut sanitized: String = flattened
        .chars()
        .map(|ch| {
            let invalid = matches!(ch, '<' | '>' | ':' | '"' | '|' | '?' | '*');
            if invalid || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }

    if sanitized.is_empty() {
        return Err(RagError::Download(format!("Invalid model filename: {filename:?}")));
    }

    Ok(sanitized)
}

/// Cache path a locator downloads to, inside `models_dir`
pub fn cached_model_path(models_dir: &Path, hf_url: &HuggingFaceUrl) -> Result<PathBuf> {
    Ok(models_dir.join(sanitize_local_filename(&hf_url.filename)?))
}

/// Download a model into `models_dir`, reusing a cached copy
pub async fn download_model_to(
    url: &str,
    models_dir: &Path,
    progress_callback: impl Fn(u64, u64),
) -> Result<PathBuf> {
    let mut hf_url = HuggingFaceUrl::parse(url)?;

    if hf_url.filename.is_empty() {
        let files = list_gguf_files(&hf_url.repo_id, &hf_url.revision).await?;
        hf_url.filename = match files.as_slice() {
            [] => {
                return Err(RagError::Download(format!(
                    "No GGUF files found in {}",
                    hf_url.repo_id
                )))
            }
            [single] => single.clone(),
            _ => {
                return Err(RagError::Download(format!(
                    "Multiple GGUF files found. Please specify one of: {}",
                    files.join(", ")
                )))
            }
        };
    }

    fs::create_dir_all(models_dir)?;

    let output_path = cached_model_path(models_dir, &hf_url)?;
    if let Ok(metadata) = fs::metadata(&output_path) {
        if metadata.len() > 0 {
            tracing::info!("Model already cached: {:?}", output_path);
            return Ok(output_path);
        }
    }

    let mut temp_name = output_path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let download_url = hf_url.download_url();
    tracing::info!("Downloading from: {}", download_url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3600)) // 1 hour timeout for large models
        .build()
        .map_err(|e| RagError::Download(format!("Failed to create HTTP client: {e}")))?;

    let mut response = client
        .get(&download_url)
        .header("User-Agent", concat!("localrag/", env!("CARGO_PKG_VERSION")))
        .send()
        .await
        .map_err(|e| RagError::Download(e.to_string()))?;

    if !response.status().is_success() {
        return Err(RagError::Download(format!(
            "{} returned status {}",
            download_url,
            response.status()
        )));
    }

    let total_size = response
        .content_length()
        .ok_or_else(|| RagError::Download("Could not determine file size".to_string()))?;

    tracing::info!("File size: {} bytes ({})", total_size, format_size(total_size));

    let progress = &progress_callback;
    write_via_temp(&temp_path, &output_path, |mut temp_file| async move {
        let mut downloaded: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| RagError::Download(e.to_string()))?
        {
            temp_file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total_size);
        }
        temp_file.flush().await?;

        if downloaded != total_size {
            return Err(RagError::Download(format!(
                "Download incomplete: got {} bytes, expected {}",
                downloaded, total_size
            )));
        }
        Ok(())
    })
    .await?;

    tracing::info!("Download complete: {:?}", output_path);

    Ok(output_path)
}

/// Fill `temp_path` with `write`, then move it to `output_path`
///
/// The partial file is removed if writing fails.
async fn write_via_temp<F, Fut>(temp_path: &Path, output_path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let file = File::create(temp_path).await?;
    let result = match write(file).await {
        Ok(()) => fs::rename(temp_path, output_path).map_err(RagError::from),
        Err(e) => Err(e),
    };

    if result.is_err() {
        if let Err(e) = fs::remove_file(temp_path) {
            tracing::warn!("Could not remove partial download {:?}: {}", temp_path, e);
        }
    }
    result
}

#[derive(Debug, serde::Deserialize)]
struct FileInfo {
    path: String,
}

async fn list_gguf_files(repo_id: &str, revision: &str) -> Result<Vec<String>> {
    let api_url = format!("{}/api/models/{}/tree/{}", HF_BASE, repo_id, revision);

    let response = reqwest::Client::new()
        .get(&api_url)
        .send()
        .await
        .map_err(|e| RagError::Download(format!("Failed to fetch repo info: {e}")))?;

    if !response.status().is_success() {
        return Err(RagError::Download(format!("API error: {}", response.status())));
    }

    let files: Vec<FileInfo> = response
        .json()
        .await
        .map_err(|e| RagError::Download(format!("Failed to parse repo listing: {e}")))?;

    Ok(files
        .into_iter()
        .filter(|f| f.path.ends_with(".gguf"))
        .map(|f| f.path)
        .collect())
}

/// Human-readable size string
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes as u64)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}
