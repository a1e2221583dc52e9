//! llama-cpp embedder
//!
//! Runs a GGUF embedding model (BERT-style) with embeddings enabled.

use std::num::NonZeroU32;
use std::path::Path;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};

use crate::embeddings::{normalize, resolve_embedding_model, Embedder, EmbeddingModelSpec};
use crate::error::{RagError, Result};
use crate::inference::engine::backend;
use crate::inference::loader::ModelSource;
use crate::types::config::EmbeddingConfig;

pub struct LlamaEmbedder {
    model: LlamaModel,
    spec: EmbeddingModelSpec,
    n_ctx: u32,
    dimensions: usize,
}

impl LlamaEmbedder {
    /// Resolve the configured model name, download it if needed, and load it
    pub async fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let spec = resolve_embedding_model(&config.model_name)?;
        let path = ModelSource::Url(spec.locator.clone()).resolve().await?;
        Self::load(&path, spec, config.n_gpu_layers)
    }

    pub fn load(path: &Path, spec: EmbeddingModelSpec, n_gpu_layers: u32) -> Result<Self> {
        let backend = backend(false)?;
        let params = LlamaModelParams::default().with_n_gpu_layers(n_gpu_layers);
        let model = LlamaModel::load_from_file(backend, path, &params)
            .map_err(|e| RagError::Load(format!("{}: {e}", path.display())))?;

        let n_ctx = match u32::try_from(model.n_ctx_train()).unwrap_or(0) {
            0 => 512,
            n => n,
        };
        let dimensions = usize::try_from(model.n_embd()).unwrap_or(0);
        if dimensions == 0 {
            return Err(RagError::Load(format!(
                "{} reports no embedding dimensions",
                path.display()
            )));
        }

        tracing::info!(
            "Loaded embedding model {} ({} dims, max {} tokens)",
            spec.name,
            dimensions,
            n_ctx
        );

        Ok(Self {
            model,
            spec,
            n_ctx,
            dimensions,
        })
    }

    fn new_context(&self) -> Result<LlamaContext<'_>> {
        let backend = backend(false)?;
        // Non-causal models need the whole input in a single micro-batch.
        let params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_batch(self.n_ctx)
            .with_n_ubatch(self.n_ctx)
            .with_embeddings(true);
        self.model
            .new_context(backend, params)
            .map_err(|e| RagError::Embedding(format!("failed to create context: {e}")))
    }

    fn embed_with(&self, ctx: &mut LlamaContext<'_>, text: &str) -> Result<Vec<f32>> {
        let mut tokens = self
            .model
            .str_to_token(text, AddBos::Always)
            .map_err(|e| RagError::Embedding(format!("tokenization failed: {e}")))?;

        let limit = self.n_ctx as usize;
        if tokens.len() > limit {
            tracing::warn!(
                "Input of {} tokens truncated to {} for {}",
                tokens.len(),
                limit,
                self.spec.name
            );
            // Keep the trailing separator token.
            let last = tokens[tokens.len() - 1];
            tokens.truncate(limit - 1);
            tokens.push(last);
        }

        let mut batch = LlamaBatch::new(tokens.len().max(1), 1);
        for (pos, token) in tokens.iter().enumerate() {
            batch
                .add(*token, pos as i32, &[0], true)
                .map_err(|e| RagError::Embedding(e.to_string()))?;
        }

        ctx.clear_kv_cache();
        ctx.decode(&mut batch)
            .map_err(|e| RagError::Embedding(format!("decode failed: {e}")))?;

        let mut embedding = ctx
            .embeddings_seq_ith(0)
            .map_err(|e| RagError::Embedding(e.to_string()))?
            .to_vec();
        normalize(&mut embedding);
        Ok(embedding)
    }
}

impl Embedder for LlamaEmbedder {
    fn model_name(&self) -> &str {
        &self.spec.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut ctx = self.new_context()?;
        self.embed_with(&mut ctx, text)
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        match self.spec.query_instruction {
            Some(instruction) => self.embed_text(&format!("{instruction}{query}")),
            None => self.embed_text(query),
        }
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut ctx = self.new_context()?;
        texts
            .iter()
            .map(|text| self.embed_with(&mut ctx, text))
            .collect()
    }
}
