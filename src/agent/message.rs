//! Message types for model conversations.
//!
//! Provides the [`Message`], [`Role`], and [`MessageContent`] types used to
//! represent conversation history sent to the model, and [`ChatHistory`],
//! the session-owned, append-only record with an explicit clear operation
//! and a sliding-window bound.

use serde::{Deserialize, Serialize};

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input (recognized speech or typed text).
    User,
    /// Assistant (model) output.
    Assistant,
    /// Tool execution result.
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// The content of a message.
///
/// Most messages contain plain text, but tool results include the call ID
/// for correlation with the tool call that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Tool execution result.
    ToolResult {
        /// The tool call ID this result corresponds to.
        call_id: String,
        /// The tool's output content.
        content: String,
    },
}

/// An assistant tool call included in an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantToolCall {
    /// Unique identifier for this tool call.
    pub call_id: String,
    /// The tool name being called.
    pub tool_name: String,
    /// JSON-encoded arguments string.
    pub arguments: String,
}

/// A message in a model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: Role,
    /// The message content.
    pub content: MessageContent,
    /// Tool calls made by the assistant (only for Assistant role).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<AssistantToolCall>,
}

impl Message {
    /// Create a text message with the given role.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text { text: text.into() },
            tool_calls: Vec::new(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Create an assistant message with tool calls and optional text.
    pub fn assistant_with_tool_calls(
        text: Option<String>,
        tool_calls: Vec<AssistantToolCall>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text {
                text: text.unwrap_or_default(),
            },
            tool_calls,
        }
    }

    /// Create a tool result message.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                call_id: call_id.into(),
                content: content.into(),
            },
            tool_calls: Vec::new(),
        }
    }
}

/// Session-owned conversation history.
///
/// Append-only except for [`clear()`](Self::clear), which resets to the
/// initial system message. Growth is bounded by a sliding window: when the
/// entry count exceeds `max_entries`, the oldest non-system messages are
/// dropped. An assistant message carrying tool calls is always dropped
/// together with its tool-result messages so the model never sees a
/// dangling pairing.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    messages: Vec<Message>,
    has_system: bool,
    max_entries: usize,
}

impl ChatHistory {
    /// Create a history, seeded with a system message if one is given.
    pub fn new(system_prompt: Option<&str>, max_entries: usize) -> Self {
        let mut messages = Vec::new();
        let has_system = system_prompt.is_some();
        if let Some(prompt) = system_prompt {
            messages.push(Message::system(prompt));
        }
        Self {
            messages,
            has_system,
            max_entries: max_entries.max(2),
        }
    }

    /// The full message sequence, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when only the initial system message (or nothing) remains.
    pub fn is_empty(&self) -> bool {
        self.messages.len() <= usize::from(self.has_system)
    }

    /// Append a message and apply the sliding-window bound.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.trim();
    }

    /// Reset to the initial system message.
    pub fn clear(&mut self) {
        self.messages.truncate(usize::from(self.has_system));
    }

    fn trim(&mut self) {
        let start = usize::from(self.has_system);
        while self.messages.len() > self.max_entries && self.messages.len() > start {
            let removed = self.messages.remove(start);
            if !removed.tool_calls.is_empty() {
                while self
                    .messages
                    .get(start)
                    .is_some_and(|m| m.role == Role::Tool)
                {
                    self.messages.remove(start);
                }
            }
        }
    }
}
