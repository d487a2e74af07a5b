//! Error types for startup and the proxy's top-level tasks.
//!
//! Per-message failures (bad stdin lines, HTTP errors, SSE decode errors)
//! never surface here: they are logged where they happen and the proxy moves
//! on. `BridgeError` covers only conditions that end the process.

use mcp_bridge_core::ConfigError;

/// Errors that terminate the bridge with a non-zero exit code.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No bearer token from `--token` or the environment.
    #[error(
        "Authorization token is required. Provide it via --token flag or MIRO_ACCESS_TOKEN environment variable"
    )]
    MissingToken,

    /// No user email from `--email` or the environment.
    #[error(
        "User email is required. Provide it via --email flag or MIRO_USER_EMAIL environment variable"
    )]
    MissingEmail,

    /// The connection configuration was rejected by the HTTP layer.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The client's stdout can no longer be written.
    #[error("Failed to write to stdout: {0}")]
    Output(#[source] std::io::Error),

    /// The queue-draining task panicked or was cancelled.
    #[error("Queue drain task failed: {0}")]
    DrainTask(#[from] tokio::task::JoinError),
}
