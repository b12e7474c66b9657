//! JSON-RPC 2.0 protocol types for tool server communication.
//!
//! Tool servers communicate with the aria core via newline-delimited
//! JSON-RPC 2.0 messages on stdin/stdout. This module defines the message
//! types and parsing logic.
//!
//! # Handshake protocol
//!
//! After spawning, aria sends a `server.handshake` request:
//!
//! ```json
//! {"jsonrpc":"2.0","method":"server.handshake","params":{"expected_id":"notes","aria_version":"0.3.0"},"id":1}
//! ```
//!
//! The server must respond with its id and version:
//!
//! ```json
//! {"jsonrpc":"2.0","result":{"id":"notes","version":"1.0.0"},"id":1}
//! ```
//!
//! # Discovery and dispatch
//!
//! `tools.list` returns the server's catalog as
//! `{"tools":[{"name","description","parameters"}]}`. `tools.call` takes
//! `{"name","arguments"}` and returns `{"content":"..."}` on success or a
//! JSON-RPC error object on failure.

use serde::{Deserialize, Serialize};

/// The JSON-RPC version string. Always `"2.0"`.
const JSONRPC_VERSION: &str = "2.0";

/// Method name for the handshake request.
pub const METHOD_HANDSHAKE: &str = "server.handshake";

/// Method name for the tool catalog request.
pub const METHOD_LIST_TOOLS: &str = "tools.list";

/// Method name for a tool invocation.
pub const METHOD_CALL_TOOL: &str = "tools.call";

/// Errors produced by the tool server transport and protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ToolServerError {
    /// The server process could not be spawned.
    #[error("failed to spawn tool server '{server_id}': {message}")]
    SpawnFailed {
        /// Configured server id.
        server_id: String,
        /// Underlying failure description.
        message: String,
    },

    /// The server process exited or closed its pipes.
    #[error("tool server '{server_id}' exited unexpectedly")]
    ProcessExited {
        /// Configured server id.
        server_id: String,
    },

    /// No response arrived within the deadline.
    #[error("tool server request timed out after {timeout_secs}s")]
    Timeout {
        /// The deadline that expired, in seconds.
        timeout_secs: u64,
    },

    /// A response line exceeded the output bound.
    #[error("tool server response exceeded {max_bytes} bytes")]
    OutputTruncated {
        /// The per-line byte bound.
        max_bytes: usize,
    },

    /// A malformed or unexpected protocol message.
    #[error("protocol error: {message}")]
    Protocol {
        /// What went wrong.
        message: String,
    },

    /// The server returned a JSON-RPC error response.
    #[error("tool server error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i32,
        /// Human-readable error message.
        message: String,
    },

    /// JSON serialization or parsing failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure on the child's pipes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A JSON-RPC 2.0 request (sent from aria to a tool server).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Request identifier for correlating responses.
    pub id: u64,
}

impl JsonRpcRequest {
    /// Creates a new JSON-RPC 2.0 request.
    pub fn new(method: &str, params: Option<serde_json::Value>, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.to_owned(),
            params,
            id,
        }
    }

    /// Serializes this request to a JSON line (with trailing newline).
    pub fn to_line(&self) -> Result<String, ToolServerError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// A JSON-RPC 2.0 success response (sent from a tool server to aria).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// The result value.
    pub result: serde_json::Value,
    /// Correlation identifier matching the request.
    pub id: u64,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (negative for standard errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A JSON-RPC 2.0 error response (sent from a tool server to aria).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// The error object.
    pub error: JsonRpcError,
    /// Correlation identifier matching the request.
    pub id: u64,
}

/// A JSON-RPC 2.0 notification (no id, no response expected).
///
/// Servers may send notifications for ambient events (progress, log
/// lines); the core drains and logs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// The notification method name.
    pub method: String,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// An incoming message from a tool server (response, error, or notification).
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// A successful response to a request.
    Response(JsonRpcResponse),
    /// An error response to a request.
    Error(JsonRpcErrorResponse),
    /// A notification (no correlation id).
    Notification(JsonRpcNotification),
}

impl ServerMessage {
    /// Parses a JSON line into a server message.
    ///
    /// Determines the variant by checking for the presence of `result`,
    /// `error`, or absence of `id` fields.
    pub fn parse(line: &str) -> Result<Self, ToolServerError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ToolServerError::Protocol {
                message: "empty message line".to_owned(),
            });
        }

        let value: serde_json::Value = serde_json::from_str(trimmed)?;

        let version = value.get("jsonrpc").and_then(|v| v.as_str());
        if version != Some(JSONRPC_VERSION) {
            return Err(ToolServerError::Protocol {
                message: format!("expected jsonrpc version \"{JSONRPC_VERSION}\", got {version:?}"),
            });
        }

        let has_id = value.get("id").is_some();
        let has_result = value.get("result").is_some();
        let has_error = value.get("error").is_some();

        if has_id && has_result {
            let response: JsonRpcResponse = serde_json::from_value(value)?;
            Ok(Self::Response(response))
        } else if has_id && has_error {
            let error: JsonRpcErrorResponse = serde_json::from_value(value)?;
            Ok(Self::Error(error))
        } else if !has_id {
            let notification: JsonRpcNotification = serde_json::from_value(value)?;
            Ok(Self::Notification(notification))
        } else {
            Err(ToolServerError::Protocol {
                message: "message has id but neither result nor error".to_owned(),
            })
        }
    }
}
