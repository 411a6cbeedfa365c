//! Incremental newline-delimited frame decoder.
//!
//! Turns a sequence of byte chunks with arbitrary boundaries into complete
//! lines, buffering any trailing partial line until its terminator arrives.

use super::error::StreamError;

/// One decoded line, stripped of its terminator. Zero-length means the
/// server sent an empty keep-alive line.
pub type RawMessage = Vec<u8>;

/// Incremental line decoder with a bounded buffer.
///
/// Feed chunks with [`push`](Self::push) as they arrive; each call returns
/// the lines completed by that chunk, in order. A line never includes its
/// `\n` terminator or a preceding `\r`. The buffered partial line is capped
/// at the configured maximum; exceeding it is a framing error and the
/// decoder's connection should be torn down.
#[derive(Debug)]
pub struct LineDecoder {
    buf: Vec<u8>,
    max_line_bytes: usize,
}

impl LineDecoder {
    /// Create a decoder that rejects lines longer than `max_line_bytes`.
    #[must_use]
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line_bytes,
        }
    }

    /// Feed one chunk and collect the lines it completes.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::MalformedFrame`] if a completed line or the
    /// buffered partial line exceeds the configured maximum. The decoder is
    /// left in an undefined state afterwards; call [`reset`](Self::reset) or
    /// drop it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<RawMessage>, StreamError> {
        let mut scan_from = self.buf.len();
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(rel) = self.buf[scan_from..].iter().position(|&b| b == b'\n') {
            let end = scan_from + rel;
            let mut line: Vec<u8> = self.buf.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.len() > self.max_line_bytes {
                return Err(StreamError::MalformedFrame {
                    limit: self.max_line_bytes,
                });
            }
            lines.push(line);
            scan_from = 0;
        }

        if self.buf.len() > self.max_line_bytes {
            return Err(StreamError::MalformedFrame {
                limit: self.max_line_bytes,
            });
        }

        Ok(lines)
    }

    /// Number of buffered bytes belonging to an incomplete line.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Discard any buffered partial line. Call when restarting a connection.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}
