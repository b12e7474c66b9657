//! Runtime events emitted by the session core for UI and observability.
//!
//! This is the sole public surface toward any frontend. Events are
//! intentionally lightweight (no heavy payloads) and delivered as value
//! copies over a broadcast channel, so observers never hold live
//! references into session state.

use uuid::Uuid;

/// Events that describe what the session is doing "right now".
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Audio capture gating changed.
    Listening {
        /// True while the session accepts capture.
        active: bool,
    },
    /// A user turn is being processed (model + tool iterations).
    Processing {
        /// True while a turn is in flight.
        active: bool,
    },
    /// Speech playback started or stopped.
    Speaking {
        /// True on playback start, false on stop.
        active: bool,
        /// The item entering or leaving playback.
        item_id: Option<Uuid>,
    },
    /// An intermediate reasoning fragment, forwarded as it is produced.
    Reasoning {
        /// The fragment text.
        text: String,
    },
    /// The final answer for a turn.
    Answer {
        /// The answer text.
        text: String,
    },
    /// The model requested a tool call (for UI/telemetry).
    ToolCall {
        /// Call identifier, stable across request and result.
        id: String,
        /// Tool name.
        name: String,
        /// Raw JSON arguments text.
        arguments_json: String,
    },
    /// A tool call finished (for UI/telemetry).
    ToolResult {
        /// Call identifier this result corresponds to.
        id: String,
        /// Tool name.
        name: String,
        /// Whether the call succeeded.
        success: bool,
    },
    /// An unrecoverable error forced the session back to idle.
    Error {
        /// Human-readable description.
        message: String,
    },
}
