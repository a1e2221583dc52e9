//! llama-cpp inference engine
//!
//! Loads a GGUF chat model and generates completions token by token.

use std::num::NonZeroU32;
use std::path::Path;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;
use llama_cpp_2::{send_logs_to_tracing, LogOptions};
use once_cell::sync::OnceCell;

use crate::error::{RagError, Result};
use crate::inference::loader::ModelSource;
use crate::inference::prompt::PromptStyle;
use crate::inference::streaming::{DeltaAccumulator, DeltaStream, Utf8Buffer};
use crate::inference::{LanguageModel, ModelMetadata};
use crate::types::config::LlmConfig;
use crate::types::response::CompletionDelta;

/// Max tokens decoded per prompt batch
const BATCH_SIZE: usize = 512;

static BACKEND: OnceCell<LlamaBackend> = OnceCell::new();

/// The process-wide llama backend, initialized on first use
///
/// llama.cpp logs go to `tracing` only when the first caller asked for verbose output.
pub(crate) fn backend(verbose: bool) -> Result<&'static LlamaBackend> {
    BACKEND.get_or_try_init(|| {
        send_logs_to_tracing(LogOptions::default().with_logs_enabled(verbose));
        LlamaBackend::init().map_err(|e| RagError::Load(format!("llama backend init failed: {e}")))
    })
}

/// Token sampling strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampling {
    /// Always the most likely token; deterministic
    Greedy,
    Random {
        temperature: f32,
        top_k: i32,
        top_p: f32,
        seed: u32,
    },
}

impl Sampling {
    pub fn from_config(config: &LlmConfig) -> Self {
        if config.temperature <= 0.0 {
            Self::Greedy
        } else {
            Self::Random {
                temperature: config.temperature,
                top_k: 40,
                top_p: 0.95,
                seed: config.seed,
            }
        }
    }

    fn build(self) -> LlamaSampler {
        match self {
            Self::Greedy => LlamaSampler::greedy(),
            Self::Random {
                temperature,
                top_k,
                top_p,
                seed,
            } => LlamaSampler::chain_simple([
                LlamaSampler::top_k(top_k),
                LlamaSampler::top_p(top_p, 1),
                LlamaSampler::temp(temperature),
                LlamaSampler::dist(seed),
            ]),
        }
    }
}

/// A loaded chat model
pub struct LlamaEngine {
    model: LlamaModel,
    model_name: String,
    config: LlmConfig,
    n_ctx: u32,
}

impl LlamaEngine {
    /// Resolve the configured source (downloading if needed) and load it
    pub async fn from_config(config: &LlmConfig) -> Result<Self> {
        let path = ModelSource::from_config(config)?.resolve().await?;
        Self::load(&path, config)
    }

    /// Load a GGUF file
    pub fn load(path: &Path, config: &LlmConfig) -> Result<Self> {
        let backend = backend(config.verbose)?;

        let params = LlamaModelParams::default().with_n_gpu_layers(config.n_gpu_layers);
        let model = LlamaModel::load_from_file(backend, path, &params)
            .map_err(|e| RagError::Load(format!("{}: {e}", path.display())))?;

        let n_ctx_train = u32::try_from(model.n_ctx_train()).unwrap_or(0);
        let n_ctx = if n_ctx_train > 0 && config.context_window > n_ctx_train {
            tracing::warn!(
                "Context window {} exceeds the model's training context {}, capping",
                config.context_window,
                n_ctx_train
            );
            n_ctx_train
        } else {
            config.context_window
        };

        let model_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "llama".to_string());

        tracing::info!(
            "Loaded {} (context {}, {} GPU layers)",
            model_name,
            n_ctx,
            config.n_gpu_layers
        );

        Ok(Self {
            model,
            model_name,
            config: config.clone(),
            n_ctx,
        })
    }

    fn tokenize(&self, prompt: &str) -> Result<Vec<LlamaToken>> {
        let add_bos = if self.config.prompt_style.includes_bos() {
            AddBos::Never
        } else {
            AddBos::Always
        };
        self.model
            .str_to_token(prompt, add_bos)
            .map_err(|e| RagError::Generation(format!("tokenization failed: {e}")))
    }

    fn new_context(&self) -> Result<LlamaContext<'_>> {
        let backend = backend(self.config.verbose)?;
        let params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_batch(BATCH_SIZE as u32);
        self.model
            .new_context(backend, params)
            .map_err(|e| RagError::Generation(format!("failed to create context: {e}")))
    }
}

impl LanguageModel for LlamaEngine {
    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            model_name: self.model_name.clone(),
            context_window: self.n_ctx as usize,
            num_output: self.config.max_new_tokens as usize,
        }
    }

    fn prompt_style(&self) -> PromptStyle {
        self.config.prompt_style
    }

    fn system_prompt(&self) -> Option<&str> {
        self.config.system_prompt.as_deref()
    }

    fn stream_formatted(&self, prompt: &str) -> Result<DeltaStream<'_>> {
        let tokens = self.tokenize(prompt)?;
        if tokens.is_empty() {
            return Err(RagError::Generation("prompt is empty".to_string()));
        }

        let n_ctx = self.n_ctx as usize;
        if tokens.len() >= n_ctx {
            return Err(RagError::Generation(format!(
                "Requested tokens ({}) exceed context window of {}",
                tokens.len(),
                n_ctx
            )));
        }
        let remaining = (self.config.max_new_tokens as usize).min(n_ctx - tokens.len());

        let mut ctx = self.new_context()?;
        let logits_idx = decode_prompt(&mut ctx, &tokens)?;
        tracing::debug!("Prompt: {} tokens, generating up to {}", tokens.len(), remaining);

        Ok(Box::new(LlamaCompletion {
            model: &self.model,
            ctx,
            sampler: Sampling::from_config(&self.config).build(),
            utf8: Utf8Buffer::new(),
            acc: DeltaAccumulator::default(),
            n_cur: tokens.len() as i32,
            logits_idx,
            remaining,
            done: false,
        }))
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        self.model
            .str_to_token(text, AddBos::Never)
            .map(|tokens| tokens.len())
            .map_err(|e| RagError::Generation(format!("tokenization failed: {e}")))
    }
}

/// Feed the prompt in batches; returns the batch index holding the last logits
fn decode_prompt(ctx: &mut LlamaContext<'_>, tokens: &[LlamaToken]) -> Result<i32> {
    let mut batch = LlamaBatch::new(BATCH_SIZE, 1);
    let last = tokens.len() - 1;

    for (chunk_idx, chunk) in tokens.chunks(BATCH_SIZE).enumerate() {
        batch.clear();
        for (offset, token) in chunk.iter().enumerate() {
            let pos = chunk_idx * BATCH_SIZE + offset;
            batch
                .add(*token, pos as i32, &[0], pos == last)
                .map_err(|e| RagError::Generation(e.to_string()))?;
        }
        ctx.decode(&mut batch)
            .map_err(|e| RagError::Generation(format!("prompt decode failed: {e}")))?;
    }

    Ok(batch.n_tokens() - 1)
}

/// Token-by-token generation; ends at an end-of-generation token or the token budget
struct LlamaCompletion<'a> {
    model: &'a LlamaModel,
    ctx: LlamaContext<'a>,
    sampler: LlamaSampler,
    utf8: Utf8Buffer,
    acc: DeltaAccumulator,
    n_cur: i32,
    logits_idx: i32,
    remaining: usize,
    done: bool,
}

impl LlamaCompletion<'_> {
    fn finish(&mut self) -> Option<Result<CompletionDelta>> {
        self.done = true;
        let rest = self.utf8.finish();
        if rest.is_empty() {
            None
        } else {
            Some(Ok(self.acc.push(rest)))
        }
    }

    fn fail(&mut self, err: RagError) -> Option<Result<CompletionDelta>> {
        self.done = true;
        Some(Err(err))
    }

    fn advance(&mut self, token: LlamaToken) -> Result<()> {
        let mut batch = LlamaBatch::new(1, 1);
        batch
            .add(token, self.n_cur, &[0], true)
            .map_err(|e| RagError::Generation(e.to_string()))?;
        self.ctx
            .decode(&mut batch)
            .map_err(|e| RagError::Generation(format!("decode failed: {e}")))?;
        self.n_cur += 1;
        self.logits_idx = 0;
        Ok(())
    }
}

impl Iterator for LlamaCompletion<'_> {
    type Item = Result<CompletionDelta>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.remaining == 0 {
                return self.finish();
            }

            let token = self.sampler.sample(&self.ctx, self.logits_idx);

            if self.model.is_eog_token(token) {
                return self.finish();
            }
            self.remaining -= 1;

            let bytes = match self.model.token_to_bytes(token, Special::Plaintext) {
                Ok(bytes) => bytes,
                Err(e) => return self.fail(RagError::Generation(format!("detokenize failed: {e}"))),
            };
            let piece = self.utf8.push(&bytes);

            if self.remaining > 0 {
                if let Err(e) = self.advance(token) {
                    return self.fail(e);
                }
            }

            if !piece.is_empty() {
                return Some(Ok(self.acc.push(piece)));
            }
        }
    }
}
