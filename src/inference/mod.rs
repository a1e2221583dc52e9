//! LLM inference
//!
//! Model loading, prompt formatting and blocking/streaming completion over llama-cpp.

pub mod engine;
pub mod loader;
pub mod model;
pub mod prompt;
pub mod streaming;

pub use engine::LlamaEngine;
pub use loader::ModelSource;
pub use model::{validate_gguf, GgufMetadata, ModelError, GGUF_MAGIC};
pub use prompt::PromptStyle;
pub use streaming::DeltaStream;

use crate::error::Result;
use crate::types::message::Message;
use crate::types::response::CompletionResponse;

/// Static facts about a loaded model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    pub model_name: String,
    /// Usable context window in tokens
    pub context_window: usize,
    /// Tokens reserved for the answer
    pub num_output: usize,
}

/// A text-completion model
///
/// Implementors provide [`stream_formatted`](Self::stream_formatted); the blocking calls
/// drain the stream, so a completion always equals the concatenation of its deltas.
pub trait LanguageModel {
    fn metadata(&self) -> ModelMetadata;

    fn prompt_style(&self) -> PromptStyle;

    fn system_prompt(&self) -> Option<&str> {
        None
    }

    /// Stream a completion of an already formatted prompt
    fn stream_formatted(&self, prompt: &str) -> Result<DeltaStream<'_>>;

    /// Number of tokens `text` occupies
    ///
    /// The default is a rough estimate of four bytes per token.
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(text.len().div_ceil(4))
    }

    fn stream_complete(&self, prompt: &str) -> Result<DeltaStream<'_>> {
        let formatted = self
            .prompt_style()
            .completion_to_prompt(prompt, self.system_prompt());
        self.stream_formatted(&formatted)
    }

    fn complete(&self, prompt: &str) -> Result<CompletionResponse> {
        CompletionResponse::collect(self.stream_complete(prompt)?)
    }

    fn stream_chat(&self, messages: &[Message]) -> Result<DeltaStream<'_>> {
        let formatted = self
            .prompt_style()
            .messages_to_prompt(messages, self.system_prompt())?;
        self.stream_formatted(&formatted)
    }

    fn chat(&self, messages: &[Message]) -> Result<CompletionResponse> {
        CompletionResponse::collect(self.stream_chat(messages)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::streaming::DeltaAccumulator;
    use crate::types::response::CompletionDelta;
    use std::cell::RefCell;

    /// Replies word by word with a fixed answer and records what it was asked
    struct ScriptedModel {
        reply: &'static str,
        seen: RefCell<Vec<String>>,
    }

    impl LanguageModel for ScriptedModel {
        fn metadata(&self) -> ModelMetadata {
            ModelMetadata {
                model_name: "scripted".to_string(),
                context_window: 512,
                num_output: 64,
            }
        }

        fn prompt_style(&self) -> PromptStyle {
            PromptStyle::Llama2
        }

        fn stream_formatted(&self, prompt: &str) -> Result<DeltaStream<'_>> {
            self.seen.borrow_mut().push(prompt.to_string());
            let mut acc = DeltaAccumulator::default();
            let deltas: Vec<Result<CompletionDelta>> = self
                .reply
                .split_inclusive(' ')
                .map(|piece| Ok(acc.push(piece.to_string())))
                .collect();
            Ok(Box::new(deltas.into_iter()))
        }
    }

    fn scripted(reply: &'static str) -> ScriptedModel {
        ScriptedModel {
            reply,
            seen: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_stream_concatenation_equals_completion() {
        let model = scripted("Fast cars roar down the open road");
        let streamed: String = model
            .stream_complete("Write a poem")
            .unwrap()
            .map(|d| d.unwrap().delta)
            .collect();
        let blocking = model.complete("Write a poem").unwrap();
        assert_eq!(streamed, blocking.text);
    }

    #[test]
    fn test_complete_formats_prompt() {
        let model = scripted("ok");
        model.complete("Hello!").unwrap();
        let seen = model.seen.borrow();
        assert!(seen[0].starts_with("<s> [INST] <<SYS>>"));
        assert!(seen[0].ends_with("Hello! [/INST]"));
    }

    #[test]
    fn test_chat_and_completion_share_format() {
        let model = scripted("ok");
        model.complete("Hi").unwrap();
        model.chat(&[Message::user("Hi")]).unwrap();
        let seen = model.seen.borrow();
        assert_eq!(seen[0], seen[1]);
    }

    #[test]
    fn test_default_token_estimate() {
        let model = scripted("");
        assert_eq!(model.count_tokens("").unwrap(), 0);
        assert_eq!(model.count_tokens("abcde").unwrap(), 2);
    }
}
