//! Model provider trait for LLM backends.
//!
//! Defines the [`ModelProvider`] trait the orchestrator drives. Adapters
//! normalize provider-specific APIs into a [`ModelTurn`]: assistant text
//! and/or a batch of requested tool calls. A turn with zero tool calls is
//! the model's final answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::AgentError;
use super::message::Message;
use super::tools::types::ToolCallRequest;

/// A tool definition provided to the model for function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (e.g. `"search"`, `"createNote"`).
    pub name: String,
    /// Human-readable description of the tool's purpose.
    pub description: String,
    /// Normalized JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Options applied to each model request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Maximum tokens to generate, if bounded.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
}

impl RequestOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// One model response: assistant text and/or requested tool calls.
///
/// Zero tool calls means the text is the final answer for the turn.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    /// Assistant text (may be empty when only tool calls are requested).
    pub text: String,
    /// Tool calls the model wants executed before it continues.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelTurn {
    /// A text-only (final) turn.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// True when the model produced a final answer.
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Trait for model provider adapters.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the provider name (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Submit the conversation and tool catalog, returning the model's
    /// next turn.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ModelRequest`] for transport/server failures
    /// and [`AgentError::Auth`] for credential rejections.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &RequestOptions,
    ) -> Result<ModelTurn, AgentError>;
}
