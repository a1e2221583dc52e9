//! Text embeddings
//!
//! The [`Embedder`] seam used by the index, and resolution of embedding model names.

pub mod llama;

pub use llama::LlamaEmbedder;

use crate::error::{RagError, Result};

/// Maps text to fixed-size vectors
pub trait Embedder {
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Embed a passage for storage in the index
    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a search query; defaults to [`embed_text`](Self::embed_text)
    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_text(query)
    }

    /// Embed several passages
    ///
    /// Default implementation calls `embed_text` sequentially.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed_text(text)).collect()
    }
}

/// Where to fetch an embedding model and how to phrase queries for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingModelSpec {
    pub name: String,
    /// HuggingFace locator of the GGUF file
    pub locator: String,
    /// Prepended to queries, not to passages
    pub query_instruction: Option<&'static str>,
}

const BGE_QUERY_INSTRUCTION: &str = "Represent this sentence for searching relevant passages: ";

/// (model name, GGUF conversion, query instruction)
const KNOWN_MODELS: [(&str, &str, Option<&str>); 3] = [
    (
        "BAAI/bge-small-en-v1.5",
        "CompendiumLabs/bge-small-en-v1.5-gguf/bge-small-en-v1.5-f16.gguf",
        Some(BGE_QUERY_INSTRUCTION),
    ),
    (
        "BAAI/bge-base-en-v1.5",
        "CompendiumLabs/bge-base-en-v1.5-gguf/bge-base-en-v1.5-f16.gguf",
        Some(BGE_QUERY_INSTRUCTION),
    ),
    (
        "nomic-ai/nomic-embed-text-v1.5",
        "nomic-ai/nomic-embed-text-v1.5-GGUF/nomic-embed-text-v1.5.f16.gguf",
        Some("search_query: "),
    ),
];

/// Resolve a model name or GGUF locator
pub fn resolve_embedding_model(name: &str) -> Result<EmbeddingModelSpec> {
    let name = name.trim();

    if let Some((known, locator, instruction)) = KNOWN_MODELS
        .iter()
        .find(|(known, _, _)| known.eq_ignore_ascii_case(name))
    {
        return Ok(EmbeddingModelSpec {
            name: known.to_string(),
            locator: locator.to_string(),
            query_instruction: *instruction,
        });
    }

    let file = name.split(['?', '#']).next().unwrap_or(name);
    if file.ends_with(".gguf") && name.contains('/') {
        return Ok(EmbeddingModelSpec {
            name: name.to_string(),
            locator: name.to_string(),
            query_instruction: None,
        });
    }

    Err(RagError::UnknownEmbeddingModel(name.to_string()))
}

/// Scale a vector to unit length; zero vectors are left alone
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Cosine similarity; 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_model() {
        let spec = resolve_embedding_model("BAAI/bge-small-en-v1.5").unwrap();
        assert_eq!(
            spec.locator,
            "CompendiumLabs/bge-small-en-v1.5-gguf/bge-small-en-v1.5-f16.gguf"
        );
        assert_eq!(spec.query_instruction, Some(BGE_QUERY_INSTRUCTION));

        let spec = resolve_embedding_model("baai/BGE-small-en-v1.5").unwrap();
        assert_eq!(spec.name, "BAAI/bge-small-en-v1.5");
    }

    #[test]
    fn test_resolve_gguf_locator() {
        let url = "https://huggingface.co/owner/repo/resolve/main/embed.gguf?download=true";
        let spec = resolve_embedding_model(url).unwrap();
        assert_eq!(spec.locator, url);
        assert!(spec.query_instruction.is_none());
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        assert!(matches!(
            resolve_embedding_model("sentence-transformers/unknown-model"),
            Err(RagError::UnknownEmbeddingModel(_))
        ));
        assert!(resolve_embedding_model("").is_err());
        assert!(resolve_embedding_model("model.gguf").is_err());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
