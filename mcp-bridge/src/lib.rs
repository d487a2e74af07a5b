//! mcp-bridge: stdio JSON-RPC client ↔ HTTP/SSE MCP server proxy.
//!
//! The binary reads newline-delimited JSON-RPC from stdin, forwards each
//! message in order as an HTTP `POST`, and writes the server's replies to
//! stdout one JSON document per line.

pub mod bridge;
pub mod cli;
pub mod error;
