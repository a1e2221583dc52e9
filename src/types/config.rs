//! Configuration types
//!
//! Model, embedding and indexing parameters. `Default` holds the demo's hard-coded values.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::inference::prompt::PromptStyle;

pub const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/TheBloke/Llama-2-13B-chat-GGUF/resolve/main/llama-2-13b-chat.Q4_0.gguf";
pub const DEFAULT_EMBED_MODEL: &str = "BAAI/bge-small-en-v1.5";

/// Chat model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// HuggingFace locator fetched on first use when no local path is given
    pub model_url: Option<String>,
    /// Pre-downloaded GGUF file; takes precedence over `model_url`
    pub model_path: Option<PathBuf>,
    /// Sampling temperature (0.0 = greedy)
    pub temperature: f32,
    /// Maximum number of tokens generated per completion
    pub max_new_tokens: u32,
    /// Context window in tokens
    pub context_window: u32,
    /// Number of layers to offload to the GPU (0 = CPU only)
    pub n_gpu_layers: u32,
    /// Forward llama.cpp's own logs
    pub verbose: bool,
    /// Seed for the distribution sampler
    #[serde(default = "default_seed")]
    pub seed: u32,
    #[serde(default)]
    pub prompt_style: PromptStyle,
    /// Overrides the prompt style's default system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_seed() -> u32 {
    1234
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_url: Some(DEFAULT_MODEL_URL.to_string()),
            model_path: None,
            temperature: 0.1,
            max_new_tokens: 256,
            // llama2 has a 4096 token context; leave some headroom
            context_window: 3900,
            n_gpu_layers: 1,
            verbose: false,
            seed: default_seed(),
            prompt_style: PromptStyle::Llama2,
            system_prompt: None,
        }
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Known model name or HuggingFace locator of a GGUF file
    pub model_name: String,
    #[serde(default)]
    pub n_gpu_layers: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_EMBED_MODEL.to_string(),
            n_gpu_layers: 0,
        }
    }
}

/// Document ingestion and retrieval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub data_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub similarity_top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            chunk_size: 1024,
            chunk_overlap: 20,
            similarity_top_k: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
}

impl RagConfig {
    /// Clamp every parameter into its usable range
    pub fn validate(&mut self) {
        let llm = &mut self.llm;
        llm.temperature = llm.temperature.clamp(0.0, 2.0);
        llm.context_window = llm.context_window.max(512);
        llm.max_new_tokens = llm.max_new_tokens.clamp(1, llm.context_window / 2);

        let index = &mut self.index;
        index.chunk_size = index.chunk_size.max(16);
        if index.chunk_overlap >= index.chunk_size {
            tracing::warn!(
                "chunk_overlap {} must be smaller than chunk_size {}, capping",
                index.chunk_overlap,
                index.chunk_size
            );
            index.chunk_overlap = index.chunk_size / 10;
        }
        index.similarity_top_k = index.similarity_top_k.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.llm.temperature, 0.1);
        assert_eq!(config.llm.max_new_tokens, 256);
        assert_eq!(config.llm.context_window, 3900);
        assert_eq!(config.llm.n_gpu_layers, 1);
        assert!(!config.llm.verbose);
        assert!(config.llm.model_path.is_none());
        assert_eq!(config.embedding.model_name, "BAAI/bge-small-en-v1.5");
        assert_eq!(config.index.data_dir, PathBuf::from("./data"));
        assert_eq!(config.index.similarity_top_k, 2);
    }

    #[test]
    fn test_defaults_survive_validation() {
        let mut config = RagConfig::default();
        config.validate();
        assert_eq!(config, RagConfig::default());
    }

    #[test]
    fn test_validation_clamps() {
        let mut config = RagConfig::default();
        config.llm.temperature = 5.0;
        config.llm.max_new_tokens = 0;
        config.index.chunk_overlap = 2048;
        config.index.similarity_top_k = 0;
        config.validate();

        assert_eq!(config.llm.temperature, 2.0);
        assert_eq!(config.llm.max_new_tokens, 1);
        assert_eq!(config.index.chunk_overlap, 102);
        assert_eq!(config.index.similarity_top_k, 1);

        config.llm.max_new_tokens = 100_000;
        config.validate();
        assert_eq!(config.llm.max_new_tokens, 1950);
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let json = r#"{
            "model_url": null,
            "model_path": "/models/llama.gguf",
            "temperature": 0.0,
            "max_new_tokens": 64,
            "context_window": 2048,
            "n_gpu_layers": 0,
            "verbose": true
        }"#;
        let llm: LlmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(llm.seed, 1234);
        assert_eq!(llm.prompt_style, PromptStyle::Llama2);
        assert_eq!(llm.model_path, Some(PathBuf::from("/models/llama.gguf")));
    }
}
