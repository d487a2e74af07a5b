//! Proxy wiring: stdin reader → request queue → upstream → stdout.

pub mod controller;
pub mod ingest;

use tokio::io::AsyncRead;

use mcp_bridge_core::{ConnectionConfig, Forwarder, HttpDispatcher, LineSink};

use crate::error::BridgeError;

pub use controller::{DrainStats, ProxyController, QueueClosed, RequestQueue};
pub use ingest::{IngestStats, ingest};

/// Counters from one complete proxy run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProxySummary {
    pub ingest: IngestStats,
    pub drain: DrainStats,
}

/// Run the proxy over arbitrary input and output until `input` reaches EOF
/// and every queued message has been dispatched.
///
/// # Errors
///
/// [`BridgeError::Output`] if `sink` stops accepting writes, or
/// [`BridgeError::DrainTask`] if the drain task panics.
pub async fn run_proxy<R, F>(
    input: R,
    sink: LineSink,
    forwarder: F,
) -> Result<ProxySummary, BridgeError>
where
    R: AsyncRead + Unpin,
    F: Forwarder + 'static,
{
    let (queue, drain) = ProxyController::spawn(forwarder, sink);
    // `queue` moves into the reader and is dropped at EOF, which lets the
    // drain loop finish once the backlog is empty.
    let ingest = ingest(input, queue).await;
    let drain = drain.await??;
    Ok(ProxySummary { ingest, drain })
}

/// Connect to the configured server and proxy the process's stdio.
///
/// Returns the process exit code. A termination signal stops the proxy
/// immediately without waiting for in-flight requests.
///
/// # Errors
///
/// Fails if the configuration is rejected or stdout is closed.
pub async fn run_bridge(config: ConnectionConfig) -> Result<i32, BridgeError> {
    let dispatcher = HttpDispatcher::new(config)?;

    tracing::info!(url = %dispatcher.config().url, "connecting to MCP server");
    tracing::info!(user = %dispatcher.config().email, "authenticated user");
    tracing::info!("proxy ready, reading JSON-RPC messages from stdin");

    let proxy = run_proxy(tokio::io::stdin(), LineSink::stdout(), dispatcher);

    tokio::select! {
        result = proxy => {
            let summary = result?;
            tracing::info!(
                enqueued = summary.ingest.enqueued,
                rejected = summary.ingest.rejected,
                dispatched = summary.drain.dispatched,
                failed = summary.drain.failed,
                "proxy finished"
            );
            Ok(0)
        }
        () = shutdown_signal() => {
            tracing::info!("shutdown signal received, proxy stopped");
            Ok(0)
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
