//! Response types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::document::NodeWithScore;

/// Response text used when nothing could be retrieved
pub const EMPTY_RESPONSE: &str = "Empty Response";

/// A finished completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
}

impl CompletionResponse {
    /// Drain a delta stream into the final text
    pub fn collect<I>(deltas: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<CompletionDelta>>,
    {
        let mut text = String::new();
        for delta in deltas {
            text.push_str(&delta?.delta);
        }
        Ok(Self { text })
    }
}

impl fmt::Display for CompletionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// One increment of a streamed completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionDelta {
    /// Text produced by this step
    pub delta: String,
    /// Everything produced so far, including `delta`
    pub text: String,
}

/// Answer to a retrieval-augmented query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub source_nodes: Vec<NodeWithScore>,
}

impl QueryResponse {
    pub fn empty() -> Self {
        Self {
            response: EMPTY_RESPONSE.to_string(),
            source_nodes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source_nodes.is_empty()
    }
}

impl fmt::Display for QueryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    fn delta(delta: &str, text: &str) -> Result<CompletionDelta> {
        Ok(CompletionDelta {
            delta: delta.to_string(),
            text: text.to_string(),
        })
    }

    #[test]
    fn test_collect_concatenates_deltas() {
        let response = CompletionResponse::collect(vec![
            delta("Roses ", "Roses "),
            delta("are red", "Roses are red"),
        ])
        .unwrap();
        assert_eq!(response.text, "Roses are red");
        assert_eq!(response.to_string(), "Roses are red");
    }

    #[test]
    fn test_collect_stops_at_first_error() {
        let deltas = vec![
            delta("a", "a"),
            Err(RagError::Generation("decode failed".to_string())),
            delta("b", "ab"),
        ];
        assert!(matches!(
            CompletionResponse::collect(deltas),
            Err(RagError::Generation(_))
        ));
    }

    #[test]
    fn test_empty_query_response() {
        let response = QueryResponse::empty();
        assert!(response.is_empty());
        assert_eq!(response.to_string(), "Empty Response");
    }
}
