//! HTTP dispatcher for the upstream MCP server.
//!
//! Each queued message becomes exactly one `POST` to the configured URL. The
//! response is relayed to the client according to its content type:
//!
//! - `text/event-stream`: body is decoded incrementally with [`SseDecoder`];
//!   each valid `data:` payload becomes one stdout line.
//! - `application/json`: body is parsed as one document and written as one
//!   compact stdout line.
//! - anything else: nothing is written.
//!
//! # Error Classification
//!
//! Failures are returned as [`DispatchError`] and never retried. All
//! variants except [`DispatchError::Output`] end only the current message's
//! cycle; `Output` means the client's stdout is gone.
//!
//! # Timeouts
//!
//! The client is built without request or connect timeouts. A streamed
//! response may legitimately stay open for as long as the server needs.

use std::error::Error as StdError;
use std::fmt;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::{self, JsonRpcMessage};
use crate::sink::LineSink;
use crate::sse::SseDecoder;

/// Server used when neither `--url` nor `MCP_SERVER_URL` is given.
pub const DEFAULT_SERVER_URL: &str = "https://miro.design/api/mcp";

/// Header carrying the user identity expected by the upstream service.
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

/// `Accept` value advertising both response encodings the bridge handles.
pub const ACCEPT_JSON_OR_SSE: &str = "application/json, text/event-stream";

const JSON_MIME: &str = "application/json";
const EVENT_STREAM_MIME: &str = "text/event-stream";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Connection settings resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Endpoint every message is POSTed to.
    pub url: String,
    /// Sent as `Authorization: Bearer <token>`.
    pub token: String,
    /// Sent as `X-User-Email`.
    pub email: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Errors building a [`HttpDispatcher`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configured URL is not an absolute URL.
    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP client could not be constructed (e.g. TLS backend failure).
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild { reason: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Why a message's dispatch cycle ended without a clean relay.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The message could not be serialized into a request body.
    #[error("Failed to encode message: {reason}")]
    Encode { reason: String },

    /// The request never produced a response (DNS, refused, reset, TLS).
    #[error("Error sending message to {url}: {reason}")]
    Connection { url: String, reason: String },

    /// The server answered with a non-2xx status.
    #[error("HTTP error: {status}")]
    HttpStatus {
        status: u16,
        /// Response body text, for diagnostics.
        body: String,
    },

    /// The response was neither JSON nor an event stream.
    #[error("Unexpected content-type: {content_type}")]
    UnexpectedContentType { content_type: String },

    /// An `application/json` body did not parse.
    #[error("Invalid JSON response body: {reason}")]
    InvalidJsonBody { reason: String },

    /// Reading the body failed part-way. Lines already emitted stay emitted.
    #[error("Response read error after {emitted} lines: {reason}")]
    BodyRead { emitted: usize, reason: String },

    /// Writing to the client's stdout failed.
    #[error("Failed to write to stdout: {0}")]
    Output(#[source] std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Classification
// ─────────────────────────────────────────────────────────────────────────────

/// How a successful response body should be relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    EventStream,
    Json,
    /// Anything else; carries the raw header value (empty if absent).
    Unexpected(String),
}

impl ResponseKind {
    /// Classify a `Content-Type` header value.
    ///
    /// Matching is a case-insensitive substring test so that parameters such
    /// as `; charset=utf-8` are accepted. An event stream wins if both types
    /// somehow appear.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let raw = content_type.unwrap_or_default();
        let lower = raw.to_ascii_lowercase();
        if lower.contains(EVENT_STREAM_MIME) {
            ResponseKind::EventStream
        } else if lower.contains(JSON_MIME) {
            ResponseKind::Json
        } else {
            ResponseKind::Unexpected(raw.to_string())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Forwarder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// One complete request/response cycle for a single message.
///
/// Implementations must not return until every line of the response has
/// been written to `sink` (or the cycle has failed). The queue controller
/// relies on this to keep at most one request in flight.
#[async_trait::async_trait]
pub trait Forwarder: Send + Sync {
    /// Forward `message` and relay the response to `sink`.
    ///
    /// Returns the number of lines written.
    async fn forward(
        &self,
        message: &JsonRpcMessage,
        sink: &mut LineSink,
    ) -> Result<usize, DispatchError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HttpDispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Upstream HTTP client.
///
/// Cheap to clone; the underlying reqwest client pools connections.
#[derive(Clone)]
pub struct HttpDispatcher {
    client: Client,
    config: ConnectionConfig,
    url: Url,
}

impl HttpDispatcher {
    /// Validate `config` and build the HTTP client.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidUrl`] if the URL does not parse,
    /// [`ConfigError::ClientBuild`] if the client cannot be built.
    pub fn new(config: ConnectionConfig) -> Result<Self, ConfigError> {
        let url = Url::parse(&config.url).map_err(|e| ConfigError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ConfigError::ClientBuild {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            config,
            url,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Run one dispatch cycle for `message`.
    ///
    /// Returns the number of lines written to `sink`. 204 No Content, and 202
    /// Accepted without a body type, are acknowledgements (typically of a
    /// notification) and relay nothing.
    #[tracing::instrument(skip_all, fields(method = %message.label()))]
    pub async fn dispatch(
        &self,
        message: &JsonRpcMessage,
        sink: &mut LineSink,
    ) -> Result<usize, DispatchError> {
        let body = codec::encode(message).map_err(|e| DispatchError::Encode {
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.config.token)
            .header(USER_EMAIL_HEADER, &self.config.email)
            .header(CONTENT_TYPE, JSON_MIME)
            .header(ACCEPT, ACCEPT_JSON_OR_SSE)
            .body(body)
            .send()
            .await
            .map_err(|e| DispatchError::Connection {
                url: self.config.url.clone(),
                reason: error_chain(&e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("<unreadable body: {e}>"),
            };
            return Err(DispatchError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if status == StatusCode::NO_CONTENT
            || (status == StatusCode::ACCEPTED && content_type.is_none())
        {
            debug!(status = %status, "upstream acknowledged message without a body");
            return Ok(0);
        }

        match ResponseKind::from_content_type(content_type.as_deref()) {
            ResponseKind::EventStream => relay_event_stream(response, sink).await,
            ResponseKind::Json => relay_json(response, sink).await,
            ResponseKind::Unexpected(content_type) => {
                Err(DispatchError::UnexpectedContentType { content_type })
            }
        }
    }
}

#[async_trait::async_trait]
impl Forwarder for HttpDispatcher {
    async fn forward(
        &self,
        message: &JsonRpcMessage,
        sink: &mut LineSink,
    ) -> Result<usize, DispatchError> {
        self.dispatch(message, sink).await
    }
}

/// Relay an SSE body chunk by chunk.
///
/// Invalid payloads are logged and skipped. A read error ends the stream
/// early; whatever was emitted before it stays emitted.
async fn relay_event_stream(
    mut response: Response,
    sink: &mut LineSink,
) -> Result<usize, DispatchError> {
    let mut decoder = SseDecoder::new();
    let mut emitted = 0usize;

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                return Err(DispatchError::BodyRead {
                    emitted,
                    reason: error_chain(&e),
                });
            }
        };

        for frame in decoder.feed(&chunk) {
            match frame {
                Ok(payload) => {
                    sink.emit(&payload).await.map_err(DispatchError::Output)?;
                    emitted += 1;
                }
                Err(e) => {
                    warn!(error = %e, "skipping SSE data line");
                }
            }
        }
    }

    if let Some(fragment) = decoder.finish() {
        debug!(
            len = fragment.len(),
            "discarding unterminated SSE line at end of stream"
        );
    }

    debug!(emitted, "SSE stream complete");
    Ok(emitted)
}

/// Relay a single JSON document as one compact line.
async fn relay_json(response: Response, sink: &mut LineSink) -> Result<usize, DispatchError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| DispatchError::BodyRead {
            emitted: 0,
            reason: error_chain(&e),
        })?;

    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| DispatchError::InvalidJsonBody {
            reason: e.to_string(),
        })?;

    sink.emit(&value.to_string())
        .await
        .map_err(DispatchError::Output)?;
    Ok(1)
}

/// Render an error with its source chain, e.g.
/// `error sending request: connection refused`.
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
