//! Retrieval-augmented question answering

pub mod engine;
pub mod synthesizer;
pub mod templates;

pub use engine::QueryEngine;
pub use synthesizer::CompactSynthesizer;
