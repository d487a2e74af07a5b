//! Line-oriented output to the stdio client.

use std::fmt;

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes newline-delimited JSON to the client's stdout.
///
/// Each [`emit`](LineSink::emit) writes one complete line in a single
/// `write_all` and flushes, so the client never sees a partial line. The
/// sink is owned by the queue-draining task, which is the only writer.
pub struct LineSink {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    lines_written: u64,
}

impl LineSink {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Box::new(writer),
            lines_written: 0,
        }
    }

    /// Sink writing to the process's stdout.
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }

    /// Write `line` followed by `\n` and flush.
    ///
    /// `line` must not itself contain a newline.
    pub async fn emit(&mut self, line: &str) -> std::io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        self.lines_written += 1;
        Ok(())
    }

    /// Total lines emitted through this sink.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }
}

impl fmt::Debug for LineSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineSink")
            .field("lines_written", &self.lines_written)
            .finish_non_exhaustive()
    }
}
