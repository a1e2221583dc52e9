//! Shared type definitions
//!
//! Data types passed between the loader, the index and the query engine.

pub mod config;
pub mod document;
pub mod message;
pub mod response;

pub use config::{EmbeddingConfig, IndexConfig, LlmConfig, RagConfig};
pub use document::{Document, DocumentMetadata, NodeWithScore, TextNode};
pub use message::{Message, Role};
pub use response::{CompletionDelta, CompletionResponse, QueryResponse};
