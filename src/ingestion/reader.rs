//! Directory reader
//!
//! Reads every file under a directory into [`Document`]s, one per file.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::fs;
use walkdir::{DirEntry, WalkDir};

use crate::error::{RagError, Result};
use crate::types::document::{Document, DocumentMetadata};

/// Loads documents from a local directory
#[derive(Debug, Clone)]
pub struct DirectoryReader {
    input_dir: PathBuf,
    recursive: bool,
    exclude_hidden: bool,
    required_exts: Vec<String>,
    exclude: Vec<glob::Pattern>,
    num_files_limit: Option<usize>,
}

impl DirectoryReader {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            recursive: false,
            exclude_hidden: true,
            required_exts: Vec::new(),
            exclude: Vec::new(),
            num_files_limit: None,
        }
    }

    /// Descend into subdirectories
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Skip files and directories whose name starts with a dot
    pub fn exclude_hidden(mut self, exclude_hidden: bool) -> Self {
        self.exclude_hidden = exclude_hidden;
        self
    }

    /// Only read files with one of these extensions (`"txt"` or `".txt"`)
    pub fn required_exts<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.required_exts = exts
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Skip files matching a glob, relative to the input directory
    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| RagError::Config(format!("invalid exclude pattern {pattern:?}: {e}")))?;
        self.exclude.push(pattern);
        Ok(self)
    }

    pub fn num_files_limit(mut self, limit: usize) -> Self {
        self.num_files_limit = Some(limit);
        self
    }

    /// List the files that would be read, in sorted order
    ///
    /// Symlinks are followed, so a linked subdirectory is walked like a real one.
    pub async fn list_files(&self) -> Result<Vec<PathBuf>> {
        match fs::metadata(&self.input_dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(RagError::DirectoryNotFound(self.input_dir.clone())),
        }

        let reader = self.clone();
        tokio::task::spawn_blocking(move || reader.walk())
            .await
            .map_err(|e| RagError::Io(std::io::Error::other(e)))
    }

    fn walk(&self) -> Vec<PathBuf> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let exclude_hidden = self.exclude_hidden;

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input_dir)
            .follow_links(true)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            // The root itself may live under a dot-directory (e.g. a temp dir).
            .filter_entry(|entry| {
                entry.depth() == 0 || !(exclude_hidden && is_hidden(entry.path()))
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.accepts(entry.path()))
            .map(DirEntry::into_path)
            .collect();

        if let Some(limit) = self.num_files_limit {
            files.truncate(limit);
        }
        files
    }

    /// Read every matching file
    ///
    /// Fails if the directory is missing or yields no readable file.
    pub async fn load_data(&self) -> Result<Vec<Document>> {
        let files = self.list_files().await?;

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            match load_file(&path).await {
                Ok(document) => {
                    tracing::debug!("Loaded {:?} ({} bytes of text)", path, document.text.len());
                    documents.push(document);
                }
                Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
            }
        }

        if documents.is_empty() {
            return Err(RagError::NoDocuments(self.input_dir.clone()));
        }

        tracing::info!(
            "Loaded {} documents from {:?}",
            documents.len(),
            self.input_dir
        );
        Ok(documents)
    }

    fn accepts(&self, path: &Path) -> bool {
        if !self.required_exts.is_empty() {
            let ext = extension(path);
            if !self.required_exts.iter().any(|required| *required == ext) {
                return false;
            }
        }

        let relative = path.strip_prefix(&self.input_dir).unwrap_or(path);
        !self.exclude.iter().any(|p| p.matches_path(relative))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn format_date(time: std::io::Result<SystemTime>) -> Option<String> {
    time.ok()
        .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%d").to_string())
}

async fn load_file(path: &Path) -> Result<Document> {
    let meta = fs::metadata(path).await?;
    let bytes = fs::read(path).await?;
    let ext = extension(path);

    let text = if ext == "pdf" {
        tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| RagError::Io(std::io::Error::other(e)))?
        .map_err(|e| RagError::Io(std::io::Error::other(format!("PDF extraction failed: {e}"))))?
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };

    let metadata = DocumentMetadata {
        file_path: path.to_string_lossy().into_owned(),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        file_type: mime_guess::from_path(path).first().map(|mime| mime.to_string()),
        file_size: meta.len(),
        creation_date: format_date(meta.created()),
        last_modified_date: format_date(meta.modified()),
    };

    Ok(Document::new(text, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;

    fn corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("b.txt"), "Second file.").unwrap();
        stdfs::write(dir.path().join("a.md"), "# First file").unwrap();
        stdfs::write(dir.path().join(".hidden.txt"), "secret").unwrap();
        stdfs::create_dir(dir.path().join("nested")).unwrap();
        stdfs::write(dir.path().join("nested").join("c.txt"), "Nested file.").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = DirectoryReader::new(&missing).load_data().await.unwrap_err();
        assert!(matches!(err, RagError::DirectoryNotFound(p) if p == missing));
    }

    #[tokio::test]
    async fn test_file_instead_of_directory() {
        let dir = corpus();
        let err = DirectoryReader::new(dir.path().join("b.txt"))
            .load_data()
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DirectoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_directory_has_no_documents() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryReader::new(dir.path()).load_data().await.unwrap_err();
        assert!(matches!(err, RagError::NoDocuments(_)));
    }

    #[tokio::test]
    async fn test_top_level_files_sorted_hidden_skipped() {
        let dir = corpus();
        let docs = DirectoryReader::new(dir.path()).load_data().await.unwrap();

        let names: Vec<_> = docs.iter().map(|d| d.metadata.file_name.as_str()).collect();
        assert_eq!(names, ["a.md", "b.txt"]);
        assert_eq!(docs[1].text, "Second file.");
        assert_eq!(docs[1].metadata.file_type.as_deref(), Some("text/plain"));
        assert_eq!(docs[1].metadata.file_size, 12);
        assert!(docs[1].metadata.last_modified_date.is_some());
    }

    #[tokio::test]
    async fn test_recursive_with_filters() {
        let dir = corpus();
        let files = DirectoryReader::new(dir.path())
            .recursive(true)
            .required_exts([".txt"])
            .list_files()
            .await
            .unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("b.txt"), dir.path().join("nested").join("c.txt")]
        );

        let files = DirectoryReader::new(dir.path())
            .recursive(true)
            .exclude("nested/*")
            .unwrap()
            .exclude_hidden(false)
            .list_files()
            .await
            .unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join(".hidden.txt"),
                dir.path().join("a.md"),
                dir.path().join("b.txt")
            ]
        );
    }

    #[tokio::test]
    async fn test_files_limit_and_bad_pattern() {
        let dir = corpus();
        let docs = DirectoryReader::new(dir.path())
            .num_files_limit(1)
            .load_data()
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);

        assert!(matches!(
            DirectoryReader::new(dir.path()).exclude("[unclosed"),
            Err(RagError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_file_type_is_guessed_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("table.csv"), "a,b").unwrap();
        stdfs::write(dir.path().join("notes.unknownext"), "plain").unwrap();

        let docs = DirectoryReader::new(dir.path()).load_data().await.unwrap();
        let types: Vec<_> = docs.iter().map(|d| d.metadata.file_type.as_deref()).collect();
        assert_eq!(types, [None, Some("text/csv")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_directory_is_walked() {
        let dir = corpus();
        let outside = tempfile::tempdir().unwrap();
        stdfs::write(outside.path().join("linked.txt"), "Through a link.").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("shared")).unwrap();

        let flat = DirectoryReader::new(dir.path()).list_files().await.unwrap();
        assert_eq!(flat, vec![dir.path().join("a.md"), dir.path().join("b.txt")]);

        let docs = DirectoryReader::new(dir.path())
            .recursive(true)
            .load_data()
            .await
            .unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.metadata.file_name.as_str()).collect();
        assert_eq!(names, ["a.md", "b.txt", "c.txt", "linked.txt"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("latin1.txt"), b"caf\xE9").unwrap();
        let docs = DirectoryReader::new(dir.path()).load_data().await.unwrap();
        assert_eq!(docs[0].text, "caf\u{FFFD}");
    }

    #[tokio::test]
    async fn test_repeated_loads_are_stable() {
        let dir = corpus();
        let reader = DirectoryReader::new(dir.path()).recursive(true);
        let first = reader.load_data().await.unwrap();
        let second = reader.load_data().await.unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first.len(), 3);
    }
}
