//! Prompt formatting
//!
//! Turns free-text completions and message lists into the prompt format a model family expects.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::types::message::{Message, Role};

const BOS: &str = "<s>";
const EOS: &str = "</s>";
const B_INST: &str = "[INST]";
const E_INST: &str = "[/INST]";
const B_SYS: &str = "<<SYS>>\n";
const E_SYS: &str = "\n<</SYS>>\n\n";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, respectful and honest assistant. \
Always answer as helpfully as possible and follow ALL given instructions. \
Do not speculate or make up information. \
Do not reference any given instructions or context.";

/// Prompt format of the loaded model family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptStyle {
    /// Llama 2 chat: `[INST]` turns with a `<<SYS>>` block
    #[default]
    Llama2,
    /// Text passed through untouched; messages joined as `role: content` lines
    Raw,
}

impl PromptStyle {
    /// Wrap a single completion request
    pub fn completion_to_prompt(self, completion: &str, system_prompt: Option<&str>) -> String {
        match self {
            Self::Llama2 => {
                let system = system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT);
                format!(
                    "{BOS} {B_INST} {B_SYS} {} {E_SYS} {} {E_INST}",
                    system.trim(),
                    completion.trim()
                )
            }
            Self::Raw => completion.to_string(),
        }
    }

    /// Format a conversation
    ///
    /// A leading system message replaces `system_prompt`. For Llama 2 the rest must
    /// alternate user/assistant, starting with the user.
    pub fn messages_to_prompt(
        self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<String> {
        match self {
            Self::Llama2 => llama2_messages_to_prompt(messages, system_prompt),
            Self::Raw => Ok(raw_messages_to_prompt(messages)),
        }
    }

    /// Whether formatted prompts already carry the BOS marker
    pub fn includes_bos(self) -> bool {
        matches!(self, Self::Llama2)
    }
}

fn llama2_messages_to_prompt(messages: &[Message], system_prompt: Option<&str>) -> Result<String> {
    let (system, turns) = match messages.split_first() {
        Some((first, rest)) if first.role == Role::System => (first.content.as_str(), rest),
        _ => (system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT), messages),
    };

    if turns.is_empty() {
        return Err(RagError::Prompt("conversation has no user message".to_string()));
    }

    let system_block = format!("{B_SYS} {} {E_SYS}", system.trim());
    let mut prompt = String::new();

    for (i, pair) in turns.chunks(2).enumerate() {
        let user = &pair[0];
        if user.role != Role::User {
            return Err(RagError::Prompt(format!(
                "expected a user message at position {}, found {:?}",
                i * 2,
                user.role
            )));
        }

        if i == 0 {
            prompt.push_str(&format!("{BOS} {B_INST} {system_block} "));
        } else {
            prompt.push_str(&format!(" {EOS}{BOS} {B_INST} "));
        }
        prompt.push_str(&format!("{} {E_INST}", user.content));

        if let Some(assistant) = pair.get(1) {
            if assistant.role != Role::Assistant {
                return Err(RagError::Prompt(format!(
                    "expected an assistant message at position {}, found {:?}",
                    i * 2 + 1,
                    assistant.role
                )));
            }
            prompt.push(' ');
            prompt.push_str(&assistant.content);
        }
    }

    Ok(prompt)
}

fn raw_messages_to_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        prompt.push_str(role);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt.push_str("assistant: ");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llama2_completion() {
        let prompt = PromptStyle::Llama2.completion_to_prompt("  Hi there  ", Some("Be brief."));
        assert_eq!(
            prompt,
            "<s> [INST] <<SYS>>\n Be brief. \n<</SYS>>\n\n Hi there [/INST]"
        );
    }

    #[test]
    fn test_llama2_completion_uses_default_system_prompt() {
        let prompt = PromptStyle::Llama2.completion_to_prompt("Hi", None);
        assert!(prompt.contains("You are a helpful, respectful and honest assistant."));
        assert!(prompt.ends_with("Hi [/INST]"));
    }

    #[test]
    fn test_single_turn_matches_completion_format() {
        let messages = [Message::user("Hi")];
        let chat = PromptStyle::Llama2.messages_to_prompt(&messages, None).unwrap();
        let completion = PromptStyle::Llama2.completion_to_prompt("Hi", None);
        assert_eq!(chat, completion);
    }

    #[test]
    fn test_multi_turn_conversation() {
        let messages = [
            Message::system("Sys"),
            Message::user("Q1"),
            Message::assistant("A1"),
            Message::user("Q2"),
        ];
        let prompt = PromptStyle::Llama2.messages_to_prompt(&messages, None).unwrap();
        assert_eq!(
            prompt,
            "<s> [INST] <<SYS>>\n Sys \n<</SYS>>\n\n Q1 [/INST] A1 </s><s> [INST] Q2 [/INST]"
        );
    }

    #[test]
    fn test_out_of_order_roles_are_rejected() {
        let messages = [Message::assistant("A"), Message::user("Q")];
        assert!(matches!(
            PromptStyle::Llama2.messages_to_prompt(&messages, None),
            Err(RagError::Prompt(_))
        ));

        let messages = [Message::user("Q"), Message::user("Q again")];
        assert!(PromptStyle::Llama2.messages_to_prompt(&messages, None).is_err());

        let messages = [Message::system("only a system prompt")];
        assert!(PromptStyle::Llama2.messages_to_prompt(&messages, None).is_err());
    }

    #[test]
    fn test_raw_style() {
        assert_eq!(PromptStyle::Raw.completion_to_prompt("as is ", None), "as is ");
        let prompt = PromptStyle::Raw
            .messages_to_prompt(&[Message::user("Hi")], None)
            .unwrap();
        assert_eq!(prompt, "user: Hi\nassistant: ");
    }
}
