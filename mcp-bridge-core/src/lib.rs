//! Core of the mcp-bridge stdio ↔ HTTP/SSE proxy.
//!
//! Transport-agnostic building blocks: the JSON-RPC line codec, incremental
//! newline framing, the SSE decoder, the stdout line sink, and the upstream
//! HTTP dispatcher. The `mcp-bridge` crate wires these into the stdin reader
//! and the sequential request queue.

pub mod codec;
pub mod framing;
pub mod sink;
pub mod sse;
pub mod upstream;

pub use codec::{FramingError, JsonRpcId, JsonRpcMessage};
pub use framing::LineSplitter;
pub use sink::LineSink;
pub use sse::{SseDecoder, SseError};
pub use upstream::{
    ConfigError, ConnectionConfig, DispatchError, Forwarder, HttpDispatcher, ResponseKind,
};
