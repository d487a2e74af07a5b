//! Incremental newline framing shared by the stdin and SSE paths.
//!
//! Reads from stdin and from an HTTP response body arrive in chunks whose
//! boundaries bear no relation to line boundaries: a chunk may end in the
//! middle of a line, a JSON token, or a multi-byte UTF-8 sequence.
//! [`LineSplitter`] keeps the single unterminated fragment between calls and
//! hands back only complete lines.

/// Reassembles newline-terminated lines from arbitrarily split byte chunks.
///
/// The pending fragment is kept as raw bytes and only decoded once its line
/// is complete. `\n` never occurs inside a multi-byte UTF-8 sequence, so a
/// character split across two chunks is always reunited before decoding.
/// Invalid UTF-8 is replaced with U+FFFD rather than rejected.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completes, in order.
    ///
    /// Returned lines exclude the terminating `\n`. A trailing `\r` is left
    /// in place; callers trim.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(String::from_utf8_lossy(&self.pending).into_owned());
            self.pending.clear();
            rest = &rest[pos + 1..];
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take the unterminated fragment at end of stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let fragment = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(fragment)
    }
}
