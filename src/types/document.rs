//! Document types
//!
//! Documents read from disk, the nodes they are split into, and scored retrieval hits.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source information attached to a document and inherited by its nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file_path: String,
    pub file_name: String,
    pub file_type: Option<String>,
    pub file_size: u64,
    pub creation_date: Option<String>,
    pub last_modified_date: Option<String>,
}

/// Raw text of one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(text: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            metadata,
        }
    }
}

/// A chunk of a document; the unit of embedding and retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextNode {
    pub id: Uuid,
    pub ref_doc_id: Uuid,
    pub text: String,
    /// Byte range of `text` in the source document
    pub start_char: usize,
    pub end_char: usize,
    pub metadata: DocumentMetadata,
}

impl TextNode {
    /// Node text prefixed with the metadata the model and the embedder get to see
    ///
    /// Only the file path is included; dates and sizes are noise for retrieval.
    pub fn content_with_metadata(&self) -> String {
        if self.metadata.file_path.is_empty() {
            return self.text.clone();
        }
        format!("file_path: {}\n\n{}", self.metadata.file_path, self.text)
    }
}

/// A retrieved node and its cosine similarity to the query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeWithScore {
    pub node: TextNode,
    pub score: f32,
}
