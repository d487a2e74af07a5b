//! Stdin reader: splits the client's byte stream into lines, decodes each
//! one, and appends it to the request queue.

use tokio::io::{AsyncRead, AsyncReadExt};

use mcp_bridge_core::{LineSplitter, codec};

use super::controller::RequestQueue;

/// Size of each read from stdin.
pub const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Counters reported when stdin closes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines decoded and queued.
    pub enqueued: u64,
    /// Non-blank lines dropped as invalid.
    pub rejected: u64,
}

/// Read `input` until EOF, queueing every valid line.
///
/// Blank lines are skipped silently. Lines that fail to decode are logged
/// and dropped; they never reach the server. A trailing fragment without a
/// newline is discarded at EOF. A read error is treated as EOF.
///
/// Returns early if the queue has been closed by the controller.
pub async fn ingest<R>(mut input: R, queue: RequestQueue) -> IngestStats
where
    R: AsyncRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let n = match input.read(&mut buf).await {
            Ok(0) => {
                tracing::info!("stdin closed");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "stdin read error");
                break;
            }
        };

        for line in splitter.feed(&buf[..n]) {
            if !accept_line(&line, &queue, &mut stats) {
                return stats;
            }
        }
    }

    if let Some(tail) = splitter.finish() {
        tracing::debug!(
            len = tail.len(),
            "discarding unterminated stdin line at end of input"
        );
    }

    tracing::debug!(
        enqueued = stats.enqueued,
        rejected = stats.rejected,
        "stdin reader finished"
    );
    stats
}

/// Decode and queue one line. Returns `false` once the queue is closed.
fn accept_line(line: &str, queue: &RequestQueue, stats: &mut IngestStats) -> bool {
    if line.trim().is_empty() {
        return true;
    }

    match codec::decode(line) {
        Ok(message) => {
            tracing::debug!(method = %message.label(), depth = queue.depth(), "queued");
            if queue.enqueue(message).is_err() {
                tracing::warn!("request queue closed, dropping remaining input");
                return false;
            }
            stats.enqueued += 1;
        }
        Err(e) => {
            stats.rejected += 1;
            tracing::warn!(error = %e, "invalid JSON from stdin");
        }
    }
    true
}
