//! Compact response synthesis
//!
//! Packs retrieved passages into as few prompts as the context window allows, answers
//! from the first and refines that answer over the rest.

use crate::error::{RagError, Result};
use crate::inference::LanguageModel;
use crate::query::templates::{refine_prompt, text_qa_prompt};
use crate::types::response::EMPTY_RESPONSE;

const SEPARATOR: &str = "\n\n";

pub struct CompactSynthesizer<'a, L> {
    llm: &'a L,
}

impl<'a, L: LanguageModel> CompactSynthesizer<'a, L> {
    pub fn new(llm: &'a L) -> Self {
        Self { llm }
    }

    /// Answer `query` from `texts`
    pub fn synthesize(&self, query: &str, texts: &[String]) -> Result<String> {
        let chunks = self.repack(query, texts)?;
        tracing::debug!("Synthesizing over {} packed chunks", chunks.len());

        let mut answer: Option<String> = None;
        for chunk in &chunks {
            let prompt = match &answer {
                None => text_qa_prompt(chunk, query),
                Some(existing) => refine_prompt(query, existing, chunk),
            };
            let response = self.llm.complete(&prompt)?;
            answer = Some(response.text.trim().to_string());
        }

        Ok(answer.unwrap_or_else(|| EMPTY_RESPONSE.to_string()))
    }

    /// Tokens left for context once the template, a previous answer and the new answer fit
    fn context_budget(&self, query: &str) -> Result<usize> {
        let meta = self.llm.metadata();
        let empty_prompt = self
            .llm
            .prompt_style()
            .completion_to_prompt(&refine_prompt(query, "", ""), self.llm.system_prompt());
        let overhead = self.llm.count_tokens(&empty_prompt)? + 2 * meta.num_output;

        match meta.context_window.checked_sub(overhead) {
            Some(budget) if budget > 0 => Ok(budget),
            _ => Err(RagError::Generation(format!(
                "query and answer ({overhead} tokens) leave no room for context in a window of {}",
                meta.context_window
            ))),
        }
    }

    /// Join texts into as few chunks as fit the budget, splitting oversized texts by words
    pub fn repack(&self, query: &str, texts: &[String]) -> Result<Vec<String>> {
        let budget = self.context_budget(query)?;
        let mut chunks = Vec::new();
        let mut current = String::new();

        for text in texts {
            for piece in self.fit_pieces(text, budget)? {
                if current.is_empty() {
                    current = piece;
                    continue;
                }
                let candidate = format!("{current}{SEPARATOR}{piece}");
                if self.llm.count_tokens(&candidate)? <= budget {
                    current = candidate;
                } else {
                    chunks.push(std::mem::replace(&mut current, piece));
                }
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        Ok(chunks)
    }

    /// Split a text into pieces that each fit the budget
    ///
    /// Cuts between words; a single word too large for the budget is cut at char boundaries.
    fn fit_pieces(&self, text: &str, budget: usize) -> Result<Vec<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        if self.llm.count_tokens(text)? <= budget {
            return Ok(vec![text.to_string()]);
        }

        let mut pieces = Vec::new();
        let mut current = String::new();
        for word in text.split_inclusive(char::is_whitespace) {
            if self.llm.count_tokens(word.trim_end())? > budget {
                if !current.trim().is_empty() {
                    pieces.push(current.trim_end().to_string());
                }
                current.clear();
                self.cut_word(word.trim_end(), budget, &mut pieces)?;
                continue;
            }

            let candidate = format!("{current}{word}");
            if !current.is_empty() && self.llm.count_tokens(candidate.trim_end())? > budget {
                pieces.push(current.trim_end().to_string());
                current = word.to_string();
            } else {
                current = candidate;
            }
        }
        if !current.trim().is_empty() {
            pieces.push(current.trim_end().to_string());
        }
        Ok(pieces)
    }

    fn cut_word(&self, word: &str, budget: usize, pieces: &mut Vec<String>) -> Result<()> {
        let mut rest = word;
        while !rest.is_empty() {
            let cut = self.fitting_prefix(rest, budget)?;
            pieces.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        Ok(())
    }

    /// Byte length of the longest char-aligned prefix within budget; at least one char
    fn fitting_prefix(&self, text: &str, budget: usize) -> Result<usize> {
        let ends: Vec<usize> = text
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .collect();

        // Binary search over the number of chars kept.
        let (mut lo, mut hi) = (1, ends.len());
        let mut best = 1;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            if self.llm.count_tokens(&text[..ends[mid - 1]])? <= budget {
                best = mid;
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }
        Ok(ends[best - 1])
    }
}
