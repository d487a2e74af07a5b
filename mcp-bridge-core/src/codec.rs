//! JSON-RPC envelope codec for the stdio side of the bridge.
//!
//! Each line read from the client is parsed into a [`JsonRpcMessage`] and
//! re-encoded as the body of one outbound HTTP request. The bridge does not
//! validate envelope shape: requests, notifications, responses, batches and
//! anything else that parses as JSON are forwarded. The parsed value is kept
//! whole, so re-encoding preserves every member and the client's member
//! order (`serde_json` is built with `preserve_order`).

use std::fmt;

use serde_json::Value;

/// Errors produced while decoding one line of client input.
///
/// Recoverable: the caller logs it and drops the line.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// The line is empty or not valid JSON.
    #[error("Malformed JSON: {reason}")]
    MalformedJson {
        /// Human-readable description of the parse failure.
        reason: String,
    },
}

/// JSON-RPC request identifier, as read from an envelope's `id` member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonRpcId {
    Number(serde_json::Number),
    String(String),
    Null,
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::Number(n) => write!(f, "{n}"),
            JsonRpcId::String(s) => f.write_str(s),
            JsonRpcId::Null => f.write_str("null"),
        }
    }
}

/// One JSON document as read from the client.
///
/// Usually a JSON-RPC object, but any JSON value is accepted. Accessors
/// look into the value for diagnostics only; the value itself is forwarded
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcMessage(Value);

impl JsonRpcMessage {
    /// Short label for diagnostics: the method name, `"batch"` for arrays,
    /// or `"response"` for anything without a method.
    pub fn label(&self) -> &str {
        match &self.0 {
            Value::Array(_) => "batch",
            value => value
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or("response"),
        }
    }

    /// The envelope's `id`, if it has a string, number or null one.
    pub fn id(&self) -> Option<JsonRpcId> {
        match self.0.get("id")? {
            Value::Number(n) => Some(JsonRpcId::Number(n.clone())),
            Value::String(s) => Some(JsonRpcId::String(s.clone())),
            Value::Null => Some(JsonRpcId::Null),
            _ => None,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for JsonRpcMessage {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Decode a single line of client input.
///
/// The line is trimmed and parsed as JSON. Shape is not checked.
///
/// # Errors
///
/// [`FramingError::MalformedJson`] if the trimmed line is empty or does not
/// parse.
pub fn decode(line: &str) -> Result<JsonRpcMessage, FramingError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(FramingError::MalformedJson {
            reason: "empty message".to_string(),
        });
    }

    serde_json::from_str(trimmed)
        .map(JsonRpcMessage)
        .map_err(|e| FramingError::MalformedJson {
            reason: e.to_string(),
        })
}

/// Encode a message as compact JSON text (no trailing newline).
///
/// # Errors
///
/// Propagates the serializer's error.
pub fn encode(message: &JsonRpcMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(&message.0)
}
