//! localrag
//!
//! Retrieval-augmented question answering over a local directory with a quantized
//! llama.cpp model: model download and loading, blocking and streamed completion,
//! embeddings, document ingestion, an in-memory vector index and a query engine.

pub mod embeddings;
pub mod error;
pub mod index;
pub mod inference;
pub mod ingestion;
pub mod query;
pub mod storage;
pub mod types;

pub use embeddings::{Embedder, LlamaEmbedder};
pub use error::{RagError, Result};
pub use index::VectorStoreIndex;
pub use inference::{LanguageModel, LlamaEngine};
pub use ingestion::{DirectoryReader, SentenceSplitter};
pub use query::QueryEngine;
pub use types::config::RagConfig;
