//! Sentence splitter
//!
//! Splits documents into overlapping chunks of at most `chunk_size` tokens, preferring
//! paragraph, then sentence, then clause boundaries. Sizes are measured with an
//! approximate token count, not a model tokenizer.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::error::{RagError, Result};
use crate::types::config::IndexConfig;
use crate::types::document::{Document, TextNode};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+|[^\w\s]").expect("valid regex"));

/// Boundaries tried from coarsest to finest; a split happens right after each match.
static PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("valid regex"));
static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?。？！]+["'”’)\]]*\s+"#).expect("valid regex"));
static CLAUSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;:，；]\s*").expect("valid regex"));
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Characters per token assumed for a run of word characters
const CHARS_PER_TOKEN: usize = 4;

/// Approximate token count
///
/// Each punctuation mark is one token and each word one token per four characters, so
/// long runs without spaces (hashes, base64) still count as large.
pub fn count_tokens(text: &str) -> usize {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().chars().count().div_ceil(CHARS_PER_TOKEN))
        .sum()
}

/// A chunk and its byte range in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    start: usize,
    end: usize,
    tokens: usize,
}

#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 20,
        }
    }
}

impl SentenceSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<TextChunk> {
        let mut splits = Vec::new();
        self.split_span(text, 0, text.len(), 0, &mut splits);
        self.merge(text, &splits)
    }

    /// Split documents into nodes that keep their document's metadata
    pub fn split_documents(&self, documents: &[Document]) -> Vec<TextNode> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.text)
                    .into_iter()
                    .map(move |chunk| TextNode {
                        id: Uuid::new_v4(),
                        ref_doc_id: doc.id,
                        text: chunk.text,
                        start_char: chunk.start,
                        end_char: chunk.end,
                        metadata: doc.metadata.clone(),
                    })
            })
            .collect()
    }

    fn split_span(&self, text: &str, start: usize, end: usize, level: usize, out: &mut Vec<Split>) {
        let piece = &text[start..end];
        let tokens = count_tokens(piece);
        if tokens <= self.chunk_size {
            if tokens > 0 {
                out.push(Split { start, end, tokens });
            }
            return;
        }

        let cuts = cut_points(piece, level);
        match cuts {
            Some(cuts) if cuts.len() > 1 => {
                let mut from = start;
                for cut in cuts {
                    self.split_span(text, from, start + cut, level + 1, out);
                    from = start + cut;
                }
            }
            Some(_) => self.split_span(text, start, end, level + 1, out),
            // Finest level reached
            None => out.push(Split { start, end, tokens }),
        }
    }

    fn merge(&self, text: &str, splits: &[Split]) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut current: Vec<Split> = Vec::new();
        let mut current_tokens = 0;

        for split in splits {
            if current_tokens + split.tokens > self.chunk_size && !current.is_empty() {
                push_chunk(text, &current, &mut chunks);

                // Carry the tail of the finished chunk over as overlap.
                let mut kept = Vec::new();
                let mut kept_tokens = 0;
                for s in current.iter().rev() {
                    if kept_tokens + s.tokens > self.chunk_overlap {
                        break;
                    }
                    kept_tokens += s.tokens;
                    kept.push(*s);
                }
                kept.reverse();

                while !kept.is_empty() && kept_tokens + split.tokens > self.chunk_size {
                    kept_tokens -= kept.remove(0).tokens;
                }
                current = kept;
                current_tokens = kept_tokens;
            }

            current.push(*split);
            current_tokens += split.tokens;
        }

        if !current.is_empty() {
            push_chunk(text, &current, &mut chunks);
        }
        chunks
    }
}

/// Offsets (relative to `piece`) to cut at for a given level; `None` past the finest level
fn cut_points(piece: &str, level: usize) -> Option<Vec<usize>> {
    let re = match level {
        0 => &*PARAGRAPH_RE,
        1 => &*SENTENCE_RE,
        2 => &*CLAUSE_RE,
        3 => &*WORD_RE,
        4 => {
            let cuts = piece
                .char_indices()
                .skip(1)
                .map(|(i, _)| i)
                .chain(std::iter::once(piece.len()))
                .collect();
            return Some(cuts);
        }
        _ => return None,
    };

    let mut cuts: Vec<usize> = re
        .find_iter(piece)
        .map(|m| m.end())
        .filter(|&end| end < piece.len())
        .collect();
    cuts.push(piece.len());
    Some(cuts)
}

fn push_chunk(text: &str, splits: &[Split], chunks: &mut Vec<TextChunk>) {
    let (Some(first), Some(last)) = (splits.first(), splits.last()) else {
        return;
    };
    let raw = &text[first.start..last.end];
    let trimmed_start = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }

    let start = first.start + trimmed_start;
    chunks.push(TextChunk {
        text: trimmed.to_string(),
        start,
        end: start + trimmed.len(),
    });
}
