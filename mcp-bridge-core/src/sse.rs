//! Server-Sent Events decoding for streamed upstream responses.
//!
//! Only `data:` lines carry anything the bridge cares about. Each payload is
//! checked for JSON well-formedness and, if valid, passed on as the exact
//! text that arrived on the wire. `event:`, `id:`, `retry:` and comment lines
//! are ignored.

use serde::de::IgnoredAny;

use crate::framing::LineSplitter;

/// Field prefix of an SSE data line.
pub const DATA_PREFIX: &str = "data:";

/// Payload some servers send to mark the end of a stream. Never forwarded.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A `data:` payload that could not be forwarded.
#[derive(Debug, thiserror::Error)]
pub enum SseError {
    /// The payload is not well-formed JSON.
    #[error("Invalid JSON in SSE: {reason}")]
    InvalidJson {
        /// The trimmed payload text, as received.
        payload: String,
        /// Parser error message.
        reason: String,
    },
}

/// Incremental decoder for one SSE response body.
///
/// Holds at most one partial line between [`feed`](SseDecoder::feed) calls.
/// Create one per response and drop it when the stream ends.
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineSplitter,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk and return the payloads of every `data:` line it
    /// completes, in wire order.
    ///
    /// `Ok` items are validated JSON text ready for stdout. `Err` items are
    /// payloads that failed validation; they do not affect later lines.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<String, SseError>> {
        self.lines
            .feed(chunk)
            .iter()
            .filter_map(|line| decode_line(line))
            .collect()
    }

    /// End the stream, returning any unterminated trailing fragment.
    ///
    /// The fragment is never decoded: an SSE line is only complete once its
    /// newline has arrived.
    pub fn finish(mut self) -> Option<String> {
        self.lines.finish()
    }
}

/// Decode one complete SSE line.
///
/// Returns `None` for lines that produce nothing: non-`data:` lines, empty
/// payloads and the [`DONE_SENTINEL`].
pub fn decode_line(line: &str) -> Option<Result<String, SseError>> {
    let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();

    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }

    Some(match serde_json::from_str::<IgnoredAny>(payload) {
        Ok(_) => Ok(payload.to_string()),
        Err(e) => Err(SseError::InvalidJson {
            payload: payload.to_string(),
            reason: e.to_string(),
        }),
    })
}
