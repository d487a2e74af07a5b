//! Command-line arguments for `mcp-bridge`.
//!
//! Defined outside `main.rs` so integration tests can parse them directly.

use clap::Parser;
use mcp_bridge_core::ConnectionConfig;
use mcp_bridge_core::upstream::DEFAULT_SERVER_URL;

use crate::error::BridgeError;

const EXAMPLES: &str = "\
Examples:
  mcp-bridge --token \"your-token\" --email \"you@example.com\"

  # Or using environment variables:
  export MIRO_ACCESS_TOKEN=\"your-token\"
  export MIRO_USER_EMAIL=\"you@example.com\"
  mcp-bridge";

/// Bridge a stdio JSON-RPC client to an HTTP/SSE MCP server.
///
/// Reads one JSON-RPC message per line from stdin, POSTs each to the server
/// in order, and writes every JSON response or SSE payload to stdout as one
/// line. Diagnostics go to stderr.
#[derive(Parser, Debug)]
#[command(name = "mcp-bridge", version, after_help = EXAMPLES)]
pub struct Cli {
    /// MCP server URL.
    #[arg(long, env = "MCP_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub url: String,

    /// Authorization token (sent as a Bearer token).
    #[arg(long, env = "MIRO_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// User email (sent as X-User-Email).
    #[arg(long, env = "MIRO_USER_EMAIL")]
    pub email: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the connection configuration.
    ///
    /// Blank values count as missing.
    ///
    /// # Errors
    ///
    /// [`BridgeError::MissingToken`] or [`BridgeError::MissingEmail`].
    pub fn into_connection_config(self) -> Result<ConnectionConfig, BridgeError> {
        let token = non_blank(self.token).ok_or(BridgeError::MissingToken)?;
        let email = non_blank(self.email).ok_or(BridgeError::MissingEmail)?;

        Ok(ConnectionConfig {
            url: self.url,
            token,
            email,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
