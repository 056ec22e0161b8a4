//! Reassembling newline-terminated lines from arbitrary byte chunks
//!
//! Splitting happens on raw bytes before any text decoding. A `\n` byte never
//! occurs inside a multi-byte UTF-8 sequence, so a character cut in half by a
//! chunk boundary is always whole again by the time its line is decoded.

use bytes::BytesMut;

use crate::error::DecodeError;

/// Owned buffer holding the incomplete tail of the current response
#[derive(Debug, Default)]
pub struct LineReassembler {
    fragment: BytesMut,
    /// Bytes of `fragment` already known to contain no newline
    scanned: usize,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the buffered fragment
    pub fn push(&mut self, chunk: &[u8]) {
        self.fragment.extend_from_slice(chunk);
    }

    /// Take the next complete line, skipping blank ones
    ///
    /// Returns `None` once only an unterminated fragment remains.
    pub fn next_line(&mut self) -> Option<Result<String, DecodeError>> {
        loop {
            let Some(offset) = self.fragment[self.scanned..].iter().position(|&b| b == b'\n') else {
                self.scanned = self.fragment.len();
                return None;
            };

            let end = self.scanned + offset;
            let line = self.fragment.split_to(end + 1);
            self.scanned = 0;

            if let Some(decoded) = decode_line(&line[..end]) {
                return Some(decoded);
            }
        }
    }

    /// Flush the unterminated tail at end of body
    ///
    /// End of stream acts as a final terminator; an empty or blank tail is
    /// dropped. Call only after [`next_line`](Self::next_line) returns `None`.
    pub fn finish(&mut self) -> Option<Result<String, DecodeError>> {
        let tail = self.fragment.split();
        self.scanned = 0;
        decode_line(&tail)
    }

    /// Drop any buffered bytes
    pub fn clear(&mut self) {
        self.fragment.clear();
        self.scanned = 0;
    }

    /// Number of bytes waiting for a terminator
    pub fn buffered(&self) -> usize {
        self.fragment.len()
    }
}

fn decode_line(bytes: &[u8]) -> Option<Result<String, DecodeError>> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    Some(String::from_utf8(bytes.to_vec()).map_err(DecodeError::from))
}
