//! OpenAI-compatible provider adapter.
//!
//! Speaks the Chat Completions API (`/v1/chat/completions`) with function
//! calling, against OpenAI itself or any compatible endpoint (Ollama,
//! vLLM, LM Studio). Requests are non-streaming: the orchestrator works in
//! whole model turns, and tool-call batches only exist once the response
//! is complete.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::error::AgentError;
use crate::agent::message::{Message, MessageContent, Role};
use crate::agent::provider::{ModelProvider, ModelTurn, RequestOptions, ToolDefinition};
use crate::agent::tools::types::ToolCallRequest;

/// Configuration for the OpenAI adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL (defaults to `https://api.openai.com`).
    pub base_url: String,
    /// Optional organization ID.
    pub org_id: Option<String>,
    /// The model to use.
    pub model: String,
}

impl OpenAiConfig {
    /// Create a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".into(),
            org_id: None,
            model: model.into(),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the organization ID.
    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }
}

/// OpenAI-compatible Chat Completions adapter.
pub struct OpenAiAdapter {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    /// Create a new adapter.
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Map an HTTP error status to an [`AgentError`].
    pub fn map_http_error(status: reqwest::StatusCode, body: &str) -> AgentError {
        let detail = extract_error_message(body).unwrap_or_else(|| body.chars().take(200).collect());
        match status.as_u16() {
            401 | 403 => AgentError::Auth(format!("{status}: {detail}")),
            _ => AgentError::ModelRequest(format!("{status}: {detail}")),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &RequestOptions,
    ) -> Result<ModelTurn, AgentError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = build_completions_request(&self.config.model, messages, options, tools);

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(org) = &self.config.org_id {
            request = request.header("OpenAI-Organization", org);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::ModelRequest(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::ModelRequest(format!("response read failed: {e}")))?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &text));
        }

        parse_completions_response(&text)
    }
}

// ── Request building ──────────────────────────────────────────

/// Build the JSON request body for the Chat Completions API.
pub fn build_completions_request(
    model: &str,
    messages: &[Message],
    options: &RequestOptions,
    tools: &[ToolDefinition],
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages_to_openai(messages),
        "stream": false,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(max_tokens) = options.max_tokens {
            obj.insert("max_tokens".into(), serde_json::json!(max_tokens));
        }
        if let Some(temp) = options.temperature {
            obj.insert("temperature".into(), serde_json::json!(temp));
        }
        if !tools.is_empty() {
            obj.insert("tools".into(), tools_to_openai(tools));
        }
    }

    body
}

/// Convert messages to OpenAI Chat Completions format.
fn messages_to_openai(messages: &[Message]) -> Vec<serde_json::Value> {
    messages.iter().map(message_to_openai).collect()
}

/// Convert a single message to OpenAI format.
fn message_to_openai(msg: &Message) -> serde_json::Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    match &msg.content {
        MessageContent::Text { text } => {
            let mut obj = serde_json::json!({
                "role": role,
                "content": text,
            });

            if !msg.tool_calls.is_empty() {
                let tc_json: Vec<serde_json::Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        serde_json::json!({
                            "id": tc.call_id,
                            "type": "function",
                            "function": {
                                "name": tc.tool_name,
                                "arguments": tc.arguments,
                            }
                        })
                    })
                    .collect();
                if let Some(obj) = obj.as_object_mut() {
                    obj.insert("tool_calls".into(), serde_json::json!(tc_json));
                }
            }

            obj
        }
        MessageContent::ToolResult { call_id, content } => {
            serde_json::json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": content,
            })
        }
    }
}

/// Convert tool definitions to the OpenAI `tools` array.
fn tools_to_openai(tools: &[ToolDefinition]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect();
    serde_json::json!(entries)
}

// ── Response parsing ──────────────────────────────────────────

/// Parse a non-streaming Chat Completions response into a [`ModelTurn`].
pub fn parse_completions_response(body: &str) -> Result<ModelTurn, AgentError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| AgentError::ModelRequest(format!("invalid response JSON: {e}")))?;

    let message = value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| AgentError::ModelRequest("response has no choices".into()))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_owned();

    let tool_calls = message
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|calls| {
            calls
                .iter()
                .map(|call| {
                    let function = call.get("function");
                    ToolCallRequest {
                        call_id: call
                            .get("id")
                            .and_then(|id| id.as_str())
                            .unwrap_or_default()
                            .to_owned(),
                        tool_name: function
                            .and_then(|f| f.get("name"))
                            .and_then(|n| n.as_str())
                            .unwrap_or_default()
                            .to_owned(),
                        arguments_json: function
                            .and_then(|f| f.get("arguments"))
                            .and_then(|a| a.as_str())
                            .unwrap_or("{}")
                            .to_owned(),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ModelTurn { text, tool_calls })
}

/// Pull the provider's error message out of an error body, if present.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_owned)
}
