//! Incremental line tokenizer over a chunked byte stream.

use bytes::{Bytes, BytesMut};

/// Append-only byte buffer that yields a line only once its `\n` has arrived.
///
/// A scan cursor remembers how far the buffer has already been searched, so
/// a long line delivered in many small chunks is scanned once overall. Lines
/// are returned without the trailing `\n` or `\r\n`. Bytes are never decoded
/// here: a newline cannot occur inside a multi-byte UTF-8 sequence, so every
/// complete line is also complete text.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
    scanned: usize,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk received from the network.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Slice the next complete line off the front of the buffer.
    pub fn next_line(&mut self) -> Option<Bytes> {
        match self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => {
                let newline = self.scanned + offset;
                let mut line = self.buf.split_to(newline + 1);
                self.scanned = 0;
                line.truncate(newline);
                strip_cr(&mut line);
                Some(line.freeze())
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    /// Take whatever is left after the stream ended, treating it as a final
    /// line without its newline.
    pub fn take_remainder(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        self.scanned = 0;
        let mut rest = self.buf.split();
        strip_cr(&mut rest);
        Some(rest.freeze())
    }

    /// Number of buffered bytes not yet returned as a line.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

fn strip_cr(line: &mut BytesMut) {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
}
