//! Tool dispatch with bounded parallelism, timeouts, and call isolation.
//!
//! The [`ToolDispatcher`] executes every tool call the model requested in
//! one turn. Calls are independent and run concurrently up to a
//! configurable ceiling; results come back in request order regardless of
//! completion order, one result per request, with every failure converted
//! into a failure result rather than dropped.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{debug, warn};

use super::tools::ToolRegistry;
use super::tools::types::{
    DEFAULT_MAX_BYTES, ToolCallRequest, ToolCallResult, ToolResult, truncate_output,
};

/// Executes the tool calls of one model turn against the registry.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    tool_timeout_secs: u64,
    max_parallel: usize,
}

impl ToolDispatcher {
    /// Create a new dispatcher.
    ///
    /// # Arguments
    ///
    /// * `registry` — The tool registry calls are routed through
    /// * `tool_timeout_secs` — Deadline for each individual call
    /// * `max_parallel` — Concurrency ceiling within one batch
    ///   (0 = unlimited; tool servers serialize internally if needed)
    pub fn new(registry: Arc<ToolRegistry>, tool_timeout_secs: u64, max_parallel: usize) -> Self {
        Self {
            registry,
            tool_timeout_secs,
            max_parallel,
        }
    }

    /// Execute a batch of tool calls.
    ///
    /// Guarantees: the returned vector has exactly one entry per request,
    /// in request order; one call's failure never cancels its siblings.
    pub async fn execute_all(&self, requests: &[ToolCallRequest]) -> Vec<ToolCallResult> {
        if requests.is_empty() {
            return Vec::new();
        }

        let limit = if self.max_parallel == 0 {
            requests.len()
        } else {
            self.max_parallel.min(requests.len())
        }
        .max(1);

        debug!(
            calls = requests.len(),
            parallelism = limit,
            "dispatching tool call batch"
        );

        // buffered() polls up to `limit` futures concurrently but yields
        // outputs in submission order.
        stream::iter(requests.iter().cloned())
            .map(|request| self.execute_one(request))
            .buffered(limit)
            .collect()
            .await
    }

    /// Execute a single call, converting every failure into a result.
    async fn execute_one(&self, request: ToolCallRequest) -> ToolCallResult {
        let start = Instant::now();
        let result = self.run_call(&request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if !result.success {
            warn!(
                tool = %request.tool_name,
                call_id = %request.call_id,
                error = result.error.as_deref().unwrap_or("unknown"),
                "tool call failed"
            );
        }

        ToolCallResult {
            call_id: request.call_id,
            tool_name: request.tool_name,
            result,
            duration_ms,
        }
    }

    async fn run_call(&self, request: &ToolCallRequest) -> ToolResult {
        if request.tool_name.trim().is_empty() {
            return ToolResult::failure("malformed tool call: missing tool name".to_owned());
        }

        // Malformed arguments from the model become a failure result fed
        // back into the conversation, never an aborted turn.
        let arguments: serde_json::Value = if request.arguments_json.trim().is_empty() {
            serde_json::json!({})
        } else {
            match serde_json::from_str(&request.arguments_json) {
                Ok(value) => value,
                Err(e) => {
                    return ToolResult::failure(format!(
                        "tool '{}': invalid JSON arguments: {e}",
                        request.tool_name
                    ));
                }
            }
        };

        let deadline = tokio::time::Duration::from_secs(self.tool_timeout_secs);
        let outcome = tokio::time::timeout(
            deadline,
            self.registry.call_tool(&request.tool_name, &arguments),
        )
        .await;

        match outcome {
            Ok(Ok(content)) => {
                let (bounded, truncated) = truncate_output(&content, DEFAULT_MAX_BYTES);
                let mut result = ToolResult::success(bounded);
                result.truncated = truncated;
                result
            }
            Ok(Err(e)) => ToolResult::failure(e.to_string()),
            Err(_) => ToolResult::failure(format!(
                "tool '{}': execution timed out after {}s",
                request.tool_name, self.tool_timeout_secs
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::protocol::ToolServerError;
    use crate::agent::tools::stdio::ToolServer;
    use crate::agent::tools::types::ToolDescriptor;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Server whose `echo` tool returns its `text` argument and whose
    /// `slow` tool sleeps first.
    struct EchoServer;

    #[async_trait]
    impl ToolServer for EchoServer {
        fn id(&self) -> &str {
            "echo"
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
            let schema = serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } }
            });
            Ok(vec![
                ToolDescriptor {
                    name: "echo".into(),
                    description: "Echo text".into(),
                    parameters: schema.clone(),
                    server_id: "echo".into(),
                },
                ToolDescriptor {
                    name: "slow".into(),
                    description: "Echo after a delay".into(),
                    parameters: schema,
                    server_id: "echo".into(),
                },
            ])
        }

        async fn call(
            &self,
            tool: &str,
            arguments: &serde_json::Value,
        ) -> Result<String, ToolServerError> {
            let text = arguments
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned();
            match tool {
                "slow" => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(text)
                }
                _ => Ok(text),
            }
        }
    }

    async fn dispatcher(tool_timeout_secs: u64, max_parallel: usize) -> ToolDispatcher {
        let mut registry = ToolRegistry::new();
        let _ = registry.register(Arc::new(EchoServer)).await;
        ToolDispatcher::new(Arc::new(registry), tool_timeout_secs, max_parallel)
    }

    fn request(call_id: &str, tool: &str, args: &str) -> ToolCallRequest {
        ToolCallRequest {
            call_id: call_id.into(),
            tool_name: tool.into(),
            arguments_json: args.into(),
        }
    }

    #[tokio::test]
    async fn one_result_per_request_in_request_order() {
        let dispatcher = dispatcher(30, 0).await;
        // The slow call completes last but must come back first.
        let requests = vec![
            request("c1", "slow", r#"{"text":"first"}"#),
            request("c2", "echo", r#"{"text":"second"}"#),
            request("c3", "echo", r#"{"text":"third"}"#),
        ];

        let results = dispatcher.execute_all(&requests).await;
        assert_eq!(results.len(), 3);
        let ids: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(results[0].result.content, "first");
        assert_eq!(results[1].result.content, "second");
    }

    #[tokio::test]
    async fn malformed_args_become_failure_result_and_siblings_run() {
        let dispatcher = dispatcher(30, 0).await;
        let requests = vec![
            request("bad", "echo", "not json {{{"),
            request("good", "echo", r#"{"text":"ok"}"#),
        ];

        let results = dispatcher.execute_all(&requests).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].result.success);
        assert!(
            results[0]
                .result
                .error
                .as_deref()
                .unwrap_or("")
                .contains("invalid JSON arguments")
        );
        assert!(results[1].result.success);
        assert_eq!(results[1].result.content, "ok");
    }

    #[tokio::test]
    async fn missing_tool_name_is_malformed() {
        let dispatcher = dispatcher(30, 0).await;
        let results = dispatcher.execute_all(&[request("c1", "  ", "{}")]).await;
        assert!(!results[0].result.success);
        assert!(
            results[0]
                .result
                .error
                .as_deref()
                .unwrap_or("")
                .contains("missing tool name")
        );
    }

    #[tokio::test]
    async fn unknown_tool_becomes_failure_result() {
        let dispatcher = dispatcher(30, 0).await;
        let results = dispatcher
            .execute_all(&[request("c1", "imaginary", "{}")])
            .await;
        assert!(!results[0].result.success);
        assert!(
            results[0]
                .result
                .error
                .as_deref()
                .unwrap_or("")
                .contains("unknown tool")
        );
    }

    #[tokio::test]
    async fn slow_tool_times_out_without_hanging_batch() {
        let dispatcher = {
            let mut registry = ToolRegistry::new();
            let _ = registry.register(Arc::new(EchoServer)).await;
            // 0s deadline is clamped by tokio to fire immediately.
            ToolDispatcher::new(Arc::new(registry), 0, 0)
        };
        let requests = vec![request("c1", "slow", r#"{"text":"never"}"#)];

        let results = dispatcher.execute_all(&requests).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].result.success);
        assert!(
            results[0]
                .result
                .error
                .as_deref()
                .unwrap_or("")
                .contains("timed out")
        );
    }

    #[tokio::test]
    async fn empty_batch_returns_empty() {
        let dispatcher = dispatcher(30, 0).await;
        let results = dispatcher.execute_all(&[]).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn bounded_parallelism_still_preserves_order() {
        let dispatcher = dispatcher(30, 1).await;
        let requests = vec![
            request("c1", "slow", r#"{"text":"a"}"#),
            request("c2", "echo", r#"{"text":"b"}"#),
        ];
        let results = dispatcher.execute_all(&requests).await;
        assert_eq!(results[0].call_id, "c1");
        assert_eq!(results[1].call_id, "c2");
    }

    #[tokio::test]
    async fn empty_arguments_default_to_empty_object() {
        let dispatcher = dispatcher(30, 0).await;
        let results = dispatcher.execute_all(&[request("c1", "echo", "")]).await;
        assert!(results[0].result.success);
        assert_eq!(results[0].result.content, "");
    }
}
