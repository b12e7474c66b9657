//! Core types for the tool registry and dispatch layer.
//!
//! Defines [`ToolDescriptor`] for discovered tools, [`ToolCallRequest`] /
//! [`ToolCallResult`] for the dispatch round-trip, and [`ToolResult`] for
//! capturing bounded execution output.

use serde::{Deserialize, Serialize};

/// Default maximum output size (100 KB).
pub const DEFAULT_MAX_BYTES: usize = 100 * 1024;

/// A callable tool discovered from a connected tool server.
///
/// Created at server-connection time and immutable for the registry's
/// lifetime; discarded when the owning server disconnects. The parameter
/// schema is already normalized (see [`super::schema::normalize_schema`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique across the registry.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// Normalized JSON Schema for the tool's arguments.
    pub parameters: serde_json::Value,
    /// Id of the server that owns this tool.
    pub server_id: String,
}

/// A tool call requested by the model.
///
/// Arguments are carried as the raw JSON text from the model so that
/// unparsable arguments can be converted into an error result downstream
/// instead of aborting the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    /// Call identifier assigned by the model, echoed back in the result.
    pub call_id: String,
    /// Name of the tool to invoke.
    pub tool_name: String,
    /// Raw JSON arguments text.
    pub arguments_json: String,
}

/// The outcome of one dispatched tool call.
///
/// One result is produced per request, always — errors become failure
/// results rather than being dropped, so the model receives closure on
/// every call it made.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    /// Call identifier matching the originating request.
    pub call_id: String,
    /// Name of the tool that was invoked.
    pub tool_name: String,
    /// Execution outcome.
    pub result: ToolResult,
    /// Wall-clock execution time in milliseconds.
    pub duration_ms: u64,
}

/// Result of a tool execution.
///
/// Contains the output content (bounded to `max_bytes`), success/error
/// status, and a flag indicating whether output was truncated.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Whether the tool execution succeeded.
    pub success: bool,
    /// Output content (bounded).
    pub content: String,
    /// Error message if the tool execution failed.
    pub error: Option<String>,
    /// Whether the output was truncated to fit within max_bytes.
    pub truncated: bool,
}

impl ToolResult {
    /// Create a successful tool result.
    pub fn success(content: String) -> Self {
        Self {
            success: true,
            content,
            error: None,
            truncated: false,
        }
    }

    /// Create a failed tool result with an error message.
    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            content: String::new(),
            error: Some(error),
            truncated: false,
        }
    }

    /// The text fed back to the model for this result.
    ///
    /// Successful calls feed their content; failed calls feed the error
    /// message so the model can react to it.
    pub fn feedback_text(&self) -> &str {
        if self.success {
            &self.content
        } else {
            self.error.as_deref().unwrap_or("tool execution failed")
        }
    }
}

/// Truncate a string to at most `max_bytes`, respecting UTF-8 boundaries.
///
/// Returns `(truncated_string, was_truncated)`.
pub fn truncate_output(s: &str, max_bytes: usize) -> (String, bool) {
    if s.len() <= max_bytes {
        return (s.to_string(), false);
    }

    // Find the last valid UTF-8 char boundary at or before max_bytes
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    let truncated = &s[..end];
    (
        format!("{truncated}\n\n[output truncated at {max_bytes} bytes]"),
        true,
    )
}
