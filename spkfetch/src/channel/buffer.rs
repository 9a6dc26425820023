//! Pattern buffer with tail-search optimization.
//!
//! Received bytes are accumulated here with terminal escape sequences
//! stripped, and patterns are only tested against the last `search_depth`
//! bytes. Matched text is consumed so the next step starts on fresh input.

use std::fmt;

use vte::{Parser, Perform};

/// Buffer for accumulating output and searching it for patterns.
pub struct PatternBuffer {
    /// The accumulated, escape-free output.
    buffer: Vec<u8>,

    /// How many bytes from the end to search. Zero searches everything.
    search_depth: usize,

    /// Escape sequence parser; kept across chunks so a sequence split
    /// between two reads is still recognized.
    parser: Parser,
}

/// Collects printable output and line control from the vte parser.
struct Printable<'a>(&'a mut Vec<u8>);

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.0.push(byte);
        }
    }
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            parser: Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping escape sequences.
    pub fn extend(&mut self, data: &[u8]) {
        let mut printable = Printable(&mut self.buffer);
        self.parser.advance(&mut printable, data);
    }

    /// Offset in the buffer where the searchable tail begins.
    pub fn tail_start(&self) -> usize {
        if self.search_depth == 0 {
            0
        } else {
            self.buffer.len().saturating_sub(self.search_depth)
        }
    }

    /// The searchable tail of the buffer.
    pub fn tail(&self) -> &[u8] {
        &self.buffer[self.tail_start()..]
    }

    /// Remove and return everything up to `end` (an absolute offset).
    ///
    /// Bytes after `end` stay buffered for the next search.
    pub fn consume(&mut self, end: usize) -> Vec<u8> {
        let end = end.min(self.buffer.len());
        self.buffer.drain(..end).collect()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(65536)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"Horizons> ");
        assert_eq!(buffer.as_slice(), b"Horizons> ");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"\x1b[1mSPK object START\x1b[0m : ");
        assert_eq!(buffer.as_slice(), b"SPK object START : ");
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"abc\x1b[3");
        buffer.extend(b"2mdef\r\n");
        assert_eq!(buffer.as_slice(), b"abcdef\r\n");
    }

    #[test]
    fn test_tail_limits_search_region() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"Horizons> ");
        buffer.extend(&[b'x'; 100]);
        assert_eq!(buffer.tail().len(), 10);
        assert_eq!(buffer.tail_start(), 100);
    }

    #[test]
    fn test_zero_depth_searches_everything() {
        let mut buffer = PatternBuffer::new(0);
        buffer.extend(&[b'x'; 100]);
        assert_eq!(buffer.tail().len(), 100);
    }

    #[test]
    fn test_consume_keeps_remainder() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"prompt: trailing");
        assert_eq!(buffer.consume(8), b"prompt: ");
        assert_eq!(buffer.as_slice(), b"trailing");
    }

    #[test]
    fn test_consume_past_end_empties_buffer() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"test data");
        assert_eq!(buffer.consume(64), b"test data");
        assert!(buffer.is_empty());
    }
}
