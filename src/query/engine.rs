//! Query engine
//!
//! Retrieves the nodes closest to a question and synthesizes an answer from them.

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::index::VectorStoreIndex;
use crate::inference::LanguageModel;
use crate::query::synthesizer::CompactSynthesizer;
use crate::types::document::NodeWithScore;
use crate::types::response::QueryResponse;

/// Retrieves the closest nodes for a question and answers from them
pub struct QueryEngine<'a, E, L> {
    index: &'a VectorStoreIndex<E>,
    llm: &'a L,
    similarity_top_k: usize,
}

impl<'a, E: Embedder, L: LanguageModel> QueryEngine<'a, E, L> {
    pub fn new(index: &'a VectorStoreIndex<E>, llm: &'a L, similarity_top_k: usize) -> Self {
        Self {
            index,
            llm,
            similarity_top_k,
        }
    }

    pub fn retrieve(&self, question: &str) -> Result<Vec<NodeWithScore>> {
        self.index.retrieve(question, self.similarity_top_k)
    }

    /// Answer `question` from the indexed documents
    ///
    /// Returns [`QueryResponse::empty`] without calling the model when nothing is retrieved.
    pub fn query(&self, question: &str) -> Result<QueryResponse> {
        let nodes = self.retrieve(question)?;
        if nodes.is_empty() {
            tracing::info!("No nodes retrieved for query, returning empty response");
            return Ok(QueryResponse::empty());
        }

        for hit in &nodes {
            tracing::debug!("Retrieved {} (score {:.4})", hit.node.metadata.file_name, hit.score);
        }

        let texts: Vec<String> = nodes.iter().map(|hit| hit.node.content_with_metadata()).collect();
        let response = CompactSynthesizer::new(self.llm).synthesize(question, &texts)?;

        Ok(QueryResponse {
            response,
            source_nodes: nodes,
        })
    }
}
