//! Document ingestion
//!
//! Reading a directory into documents and splitting them into indexable nodes.

pub mod reader;
pub mod splitter;

pub use reader::DirectoryReader;
pub use splitter::{count_tokens, SentenceSplitter, TextChunk};
