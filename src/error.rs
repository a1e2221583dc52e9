//! Error types
//!
//! A single error taxonomy for every stage of the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::inference::model::ModelError;
use crate::storage::StorageError;

/// Errors raised while loading models, ingesting documents, indexing or querying
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Download failed: {0}")]
    Download(String),
    #[error("Invalid model file: {0}")]
    Model(#[from] ModelError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Invalid prompt: {0}")]
    Prompt(String),
    #[error("Generation failed: {0}")]
    Generation(String),
    #[error("Embedding failed: {0}")]
    Embedding(String),
    #[error("Unknown embedding model: {0}")]
    UnknownEmbeddingModel(String),
    #[error("Directory {} does not exist", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("No files found in {}", .0.display())]
    NoDocuments(PathBuf),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Retrieval failed: {0}")]
    Retrieval(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;
