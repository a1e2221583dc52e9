//! In-memory vector index
//!
//! Brute-force cosine similarity over every node; corpora here are small enough that
//! a linear scan beats maintaining a graph index.

use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{RagError, Result};
use crate::inference::LanguageModel;
use crate::ingestion::splitter::SentenceSplitter;
use crate::query::engine::QueryEngine;
use crate::types::document::{Document, NodeWithScore, TextNode};

/// Nodes embedded per `embed_batch` call
const EMBED_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone)]
struct IndexEntry {
    node: TextNode,
    embedding: Vec<f32>,
}

/// Nodes and their embeddings, built once from a document set
pub struct VectorStoreIndex<E> {
    embedder: E,
    entries: Vec<IndexEntry>,
    document_count: usize,
}

impl<E: Embedder> VectorStoreIndex<E> {
    /// Split, embed and store every document
    pub fn from_documents(
        documents: Vec<Document>,
        embedder: E,
        splitter: &SentenceSplitter,
    ) -> Result<Self> {
        let nodes = splitter.split_documents(&documents);
        tracing::info!(
            "Split {} documents into {} nodes",
            documents.len(),
            nodes.len()
        );
        Self::from_nodes(nodes, embedder, documents.len())
    }

    /// Embed and store pre-split nodes
    pub fn from_nodes(nodes: Vec<TextNode>, embedder: E, document_count: usize) -> Result<Self> {
        let mut entries = Vec::with_capacity(nodes.len());
        let expected = embedder.dimensions();

        for batch in nodes.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(TextNode::content_with_metadata).collect();
            let embeddings = embedder.embed_batch(&texts)?;
            if embeddings.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            for (node, embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != expected {
                    return Err(RagError::Embedding(format!(
                        "{} returned {} dimensions, expected {}",
                        embedder.model_name(),
                        embedding.len(),
                        expected
                    )));
                }
                entries.push(IndexEntry {
                    node: node.clone(),
                    embedding,
                });
            }
            tracing::debug!("Embedded {}/{} nodes", entries.len(), nodes.len());
        }

        tracing::info!(
            "Indexed {} nodes with {}",
            entries.len(),
            embedder.model_name()
        );

        Ok(Self {
            embedder,
            entries,
            document_count,
        })
    }

    /// Number of indexed nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of documents the index was built from
    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TextNode> {
        self.entries.iter().map(|entry| &entry.node)
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// The `top_k` nodes most similar to `query`, best first
    ///
    /// Equal scores keep insertion order.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<NodeWithScore>> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed_query(query)
            .map_err(|e| RagError::Retrieval(format!("query embedding failed: {e}")))?;

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query_embedding, &entry.embedding), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| NodeWithScore {
                node: entry.node.clone(),
                score,
            })
            .collect())
    }

    /// Question answering over this index
    pub fn as_query_engine<'a, L: LanguageModel>(
        &'a self,
        llm: &'a L,
        similarity_top_k: usize,
    ) -> QueryEngine<'a, E, L> {
        QueryEngine::new(self, llm, similarity_top_k)
    }
}
