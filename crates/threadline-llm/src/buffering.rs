use std::collections::VecDeque;

use crate::error::{ProducerError, Result};

/// Byte buffer that yields complete, trimmed lines.
/// Network chunks may split lines (and UTF-8 sequences) anywhere.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Next complete line, or None until a newline arrives
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();

        match std::str::from_utf8(&line_bytes) {
            Ok(line) => Some(Ok(line.trim().to_string())),
            Err(e) => Some(Err(ProducerError::Parse(format!("invalid UTF-8: {}", e)))),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_extends() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"data: {\"a\"");
        assert!(buffer.next_line().is_none());

        buffer.extend(b":1}\n\ndata: [DONE]\n");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "data: {\"a\":1}");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "data: [DONE]");
        assert!(buffer.next_line().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let mut buffer = CircularLineBuffer::with_capacity(16);
        let bytes = "olá\n".as_bytes();

        buffer.extend(&bytes[..3]);
        assert!(buffer.next_line().is_none());
        buffer.extend(&bytes[3..]);
        assert_eq!(buffer.next_line().unwrap().unwrap(), "olá");
    }
}
