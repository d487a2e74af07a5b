//! Ordered request queue and the task that drains it.
//!
//! The queue is an unbounded channel. [`RequestQueue`] is the append-only
//! half handed to the stdin reader; the receiving half is private to
//! [`ProxyController`], whose drain loop is the only consumer. Because that
//! loop awaits each dispatch to completion before taking the next message,
//! at most one request is ever in flight, and enqueueing while a dispatch is
//! running never starts a second loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mcp_bridge_core::{DispatchError, Forwarder, JsonRpcMessage, LineSink};

use crate::error::BridgeError;

// ─────────────────────────────────────────────────────────────────────────────
// RequestQueue
// ─────────────────────────────────────────────────────────────────────────────

/// Returned by [`RequestQueue::enqueue`] once the controller has stopped.
/// Carries the message back to the caller.
#[derive(Debug, thiserror::Error)]
#[error("request queue is closed")]
pub struct QueueClosed(pub JsonRpcMessage);

#[derive(Debug, Default)]
struct QueueState {
    depth: AtomicUsize,
}

/// Append-only handle to the controller's queue.
///
/// Dropping every handle closes the queue: the controller finishes the
/// messages already queued and then stops.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    tx: mpsc::UnboundedSender<JsonRpcMessage>,
    state: Arc<QueueState>,
}

impl RequestQueue {
    /// Append `message` to the tail of the queue.
    pub fn enqueue(&self, message: JsonRpcMessage) -> Result<(), QueueClosed> {
        // Count before sending so the consumer never decrements below zero.
        self.state.depth.fetch_add(1, Ordering::SeqCst);
        self.tx.send(message).map_err(|e| {
            self.state.depth.fetch_sub(1, Ordering::SeqCst);
            QueueClosed(e.0)
        })
    }

    /// Messages waiting to be dispatched (excluding the one in flight).
    pub fn depth(&self) -> usize {
        self.state.depth.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProxyController
// ─────────────────────────────────────────────────────────────────────────────

/// Counters reported when the drain loop ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainStats {
    /// Messages taken off the queue and sent (successfully or not).
    pub dispatched: u64,
    /// Dispatch cycles that ended in a logged error.
    pub failed: u64,
    /// Lines written to stdout.
    pub lines_emitted: u64,
}

/// Owns the queue's receiving half, the forwarder and the stdout sink.
pub struct ProxyController<F> {
    rx: mpsc::UnboundedReceiver<JsonRpcMessage>,
    state: Arc<QueueState>,
    forwarder: F,
    sink: LineSink,
}

impl<F: Forwarder + 'static> ProxyController<F> {
    /// Create an idle controller and the queue handle that feeds it.
    pub fn new(forwarder: F, sink: LineSink) -> (RequestQueue, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(QueueState::default());
        let queue = RequestQueue {
            tx,
            state: state.clone(),
        };
        let controller = Self {
            rx,
            state,
            forwarder,
            sink,
        };
        (queue, controller)
    }

    /// Create a controller and run its drain loop on a background task.
    pub fn spawn(
        forwarder: F,
        sink: LineSink,
    ) -> (RequestQueue, JoinHandle<Result<DrainStats, BridgeError>>) {
        let (queue, controller) = Self::new(forwarder, sink);
        let handle = tokio::spawn(controller.drain());
        (queue, handle)
    }

    /// Dispatch queued messages one at a time, in order, until the queue is
    /// closed and empty.
    ///
    /// Every per-message failure is logged and skipped. Only a stdout write
    /// failure stops the loop early.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Output`] if the client's stdout is closed.
    pub async fn drain(mut self) -> Result<DrainStats, BridgeError> {
        let mut stats = DrainStats::default();

        while let Some(message) = self.rx.recv().await {
            self.state.depth.fetch_sub(1, Ordering::SeqCst);

            tracing::info!(
                method = %message.label(),
                id = %message.id().map(|id| id.to_string()).unwrap_or_default(),
                "sending"
            );

            let result = self.forwarder.forward(&message, &mut self.sink).await;
            stats.dispatched += 1;

            match result {
                Ok(lines) => {
                    stats.lines_emitted += lines as u64;
                    tracing::debug!(method = %message.label(), lines, "dispatch complete");
                }
                Err(DispatchError::Output(e)) => {
                    tracing::error!(error = %e, "stdout closed, stopping");
                    return Err(BridgeError::Output(e));
                }
                Err(e) => {
                    stats.failed += 1;
                    if let DispatchError::BodyRead { emitted, .. } = &e {
                        stats.lines_emitted += *emitted as u64;
                    }
                    log_dispatch_error(&message, &e);
                }
            }
        }

        tracing::info!(
            dispatched = stats.dispatched,
            failed = stats.failed,
            lines = stats.lines_emitted,
            "request queue drained"
        );
        Ok(stats)
    }
}

/// Log a recoverable dispatch failure with the fields relevant to its kind.
fn log_dispatch_error(message: &JsonRpcMessage, error: &DispatchError) {
    let method = message.label();
    match error {
        DispatchError::HttpStatus { status, body } => {
            tracing::error!(method, status, response = %body, "HTTP error");
        }
        DispatchError::UnexpectedContentType { content_type } => {
            tracing::error!(method, content_type = %content_type, "unexpected content-type");
        }
        DispatchError::BodyRead { emitted, reason } => {
            tracing::error!(method, emitted, reason = %reason, "response read error");
        }
        DispatchError::Encode { .. }
        | DispatchError::Connection { .. }
        | DispatchError::InvalidJsonBody { .. }
        | DispatchError::Output(_) => {
            tracing::error!(method, error = %error, "error sending message");
        }
    }
}
