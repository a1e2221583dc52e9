//! Streaming support
//!
//! Token pieces arrive as raw bytes and a multi-byte character can straddle two tokens,
//! so pieces go through [`Utf8Buffer`] before they become deltas.

use crate::error::Result;
use crate::types::response::CompletionDelta;

/// Lazy, single-pass sequence of completion deltas
pub type DeltaStream<'a> = Box<dyn Iterator<Item = Result<CompletionDelta>> + 'a>;

/// Reassembles UTF-8 text from byte pieces
#[derive(Debug, Default)]
pub struct Utf8Buffer {
    pending: Vec<u8>,
}

impl Utf8Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every complete character available so far
    ///
    /// Invalid sequences become U+FFFD; an incomplete trailing sequence is held back.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + bad);
                        }
                        None => {
                            self.pending.drain(..valid_up_to);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left at end of stream
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Tracks the running text of a stream
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    text: String,
}

impl DeltaAccumulator {
    pub fn push(&mut self, delta: String) -> CompletionDelta {
        self.text.push_str(&delta);
        CompletionDelta {
            delta,
            text: self.text.clone(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(b"fast "), "fast ");
        assert_eq!(buf.push(b"cars"), "cars");
        assert_eq!(buf.finish(), "");
    }

    #[test]
    fn test_split_multibyte_character() {
        // "é" is 0xC3 0xA9
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(b"caf\xC3"), "caf");
        assert_eq!(buf.push(b"\xA9!"), "é!");
    }

    #[test]
    fn test_four_byte_character_over_three_pieces() {
        // 🐈 is F0 9F 90 88
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(b"\xF0"), "");
        assert_eq!(buf.push(b"\x9F\x90"), "");
        assert_eq!(buf.push(b"\x88"), "🐈");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_dangling_bytes_flushed_lossily() {
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(b"x\xE2\x82"), "x");
        assert_eq!(buf.finish(), "\u{FFFD}");
    }

    #[test]
    fn test_accumulator_tracks_running_text() {
        let mut acc = DeltaAccumulator::default();
        acc.push("Roses ".to_string());
        let last = acc.push("are red".to_string());
        assert_eq!(last.delta, "are red");
        assert_eq!(last.text, "Roses are red");
        assert_eq!(acc.text(), "Roses are red");
    }
}
