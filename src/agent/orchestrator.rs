//! Conversation orchestrator: the model/tool iteration loop.
//!
//! [`ConversationOrchestrator`] owns the chat history for a session,
//! submits turns to the model, dispatches requested tool calls, and
//! iterates until the model produces a final answer or the iteration
//! ceiling is reached. Reasoning tool calls are spoken (fast) as they
//! appear; the final answer is spoken at normal rate. Tool failures of
//! every kind are resolved into results fed back to the model; only model
//! request failures (after bounded retry) propagate to the caller.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatcher::ToolDispatcher;
use super::error::AgentError;
use super::message::{AssistantToolCall, ChatHistory, Message};
use super::provider::{ModelProvider, ModelTurn, RequestOptions, ToolDefinition};
use super::tools::ToolRegistry;
use super::tools::types::ToolCallResult;
use super::types::{AgentConfig, StopReason, TurnOutcome};
use crate::runtime::RuntimeEvent;
use crate::speech::{SpeechItem, SpeechKind, SpeechQueue};

/// How much of each tool outcome is quoted in a synthesized answer.
const SYNTHESIS_SNIPPET_BYTES: usize = 240;

/// How many tool outcomes a synthesized answer quotes.
const SYNTHESIS_MAX_SNIPPETS: usize = 3;

/// Drives one session's conversation turns.
pub struct ConversationOrchestrator {
    config: AgentConfig,
    provider: Arc<dyn ModelProvider>,
    dispatcher: ToolDispatcher,
    tool_definitions: Vec<ToolDefinition>,
    history: ChatHistory,
    queue: Arc<SpeechQueue>,
    runtime_tx: Option<broadcast::Sender<RuntimeEvent>>,
    options: RequestOptions,
}

impl ConversationOrchestrator {
    /// Create an orchestrator over a connected registry.
    ///
    /// The tool catalog is snapshotted here; reconnect servers before
    /// constructing the orchestrator.
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ToolRegistry>,
        queue: Arc<SpeechQueue>,
    ) -> Self {
        let tool_definitions: Vec<ToolDefinition> = registry
            .tools()
            .iter()
            .map(|t| ToolDefinition::new(&t.name, &t.description, t.parameters.clone()))
            .collect();

        let dispatcher = ToolDispatcher::new(
            Arc::clone(&registry),
            config.tool_timeout_secs,
            config.max_parallel_tool_calls,
        );

        let history = ChatHistory::new(config.system_prompt.as_deref(), config.max_history_entries);

        Self {
            config,
            provider,
            dispatcher,
            tool_definitions,
            history,
            queue,
            runtime_tx: None,
            options: RequestOptions::new(),
        }
    }

    /// Attach a runtime event broadcaster for UI/observability.
    pub fn with_runtime_events(mut self, tx: broadcast::Sender<RuntimeEvent>) -> Self {
        self.runtime_tx = Some(tx);
        self
    }

    /// Set the request options used for each model call.
    pub fn with_request_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// The conversation history, oldest first.
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Reset the history to the initial system message.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Process one user turn to completion.
    ///
    /// Always produces a response for the caller: the model's final
    /// answer, or a best-effort synthesis from tool outcomes when the
    /// iteration ceiling is hit. Cancellation (barge-in) lets in-flight
    /// tool calls finish and records their results, but skips the speech
    /// path and returns early with [`StopReason::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ModelRequest`] / [`AgentError::Auth`] when
    /// the provider fails beyond the bounded retry budget. Tool failures
    /// never propagate; they are fed back to the model as results.
    pub async fn handle_user_turn(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        self.history.push(Message::user(text));
        let mut tool_results: Vec<ToolCallResult> = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            if cancel.is_cancelled() {
                info!(iteration, "turn cancelled before model request");
                return Ok(TurnOutcome {
                    answer: String::new(),
                    stop_reason: StopReason::Cancelled,
                    iterations: iteration - 1,
                    tool_results,
                });
            }

            debug!(
                iteration,
                max_iterations = self.config.max_iterations,
                "starting model iteration"
            );

            let turn = match self.send_with_retry(cancel).await {
                Ok(turn) => turn,
                Err(e) if cancel.is_cancelled() => {
                    debug!(error = %e, "model request abandoned by interrupt");
                    return Ok(TurnOutcome {
                        answer: String::new(),
                        stop_reason: StopReason::Cancelled,
                        iterations: iteration - 1,
                        tool_results,
                    });
                }
                Err(e) => return Err(e),
            };

            if turn.is_final() {
                let answer = turn.text;
                self.history.push(Message::assistant(&answer));
                let cancelled = cancel.is_cancelled();
                if !cancelled && !answer.trim().is_empty() {
                    self.speak(&answer, SpeechKind::Answer, self.config.answer_rate);
                    self.emit(RuntimeEvent::Answer {
                        text: answer.clone(),
                    });
                }
                info!(iteration, "turn complete");
                return Ok(TurnOutcome {
                    answer,
                    stop_reason: if cancelled {
                        StopReason::Cancelled
                    } else {
                        StopReason::Complete
                    },
                    iterations: iteration,
                    tool_results,
                });
            }

            info!(
                iteration,
                calls = turn.tool_calls.len(),
                tools = ?turn.tool_calls.iter().map(|c| c.tool_name.as_str()).collect::<Vec<_>>(),
                "model requested tool calls"
            );

            // Speak reasoning fragments before execution so multi-step
            // turns give audible feedback as they progress.
            for call in &turn.tool_calls {
                self.emit(RuntimeEvent::ToolCall {
                    id: call.call_id.clone(),
                    name: call.tool_name.clone(),
                    arguments_json: call.arguments_json.clone(),
                });
                if self.config.is_reasoning_tool(&call.tool_name) && !cancel.is_cancelled() {
                    if let Some(thought) = reasoning_text(&call.arguments_json) {
                        self.speak(&thought, SpeechKind::Reasoning, self.config.reasoning_rate);
                        self.emit(RuntimeEvent::Reasoning { text: thought });
                    }
                }
            }

            // In-flight calls run to completion even across an interrupt;
            // their results stay in history for continuity.
            let results = self.dispatcher.execute_all(&turn.tool_calls).await;

            let assistant_calls: Vec<AssistantToolCall> = turn
                .tool_calls
                .iter()
                .map(|call| AssistantToolCall {
                    call_id: call.call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    arguments: call.arguments_json.clone(),
                })
                .collect();
            self.history.push(Message::assistant_with_tool_calls(
                if turn.text.trim().is_empty() {
                    None
                } else {
                    Some(turn.text.clone())
                },
                assistant_calls,
            ));

            for result in &results {
                self.emit(RuntimeEvent::ToolResult {
                    id: result.call_id.clone(),
                    name: result.tool_name.clone(),
                    success: result.result.success,
                });
                self.history.push(Message::tool_result(
                    &result.call_id,
                    result.result.feedback_text(),
                ));
            }
            tool_results.extend(results);
        }

        // Ceiling reached: the user still gets a response.
        warn!(
            max_iterations = self.config.max_iterations,
            "iteration ceiling reached, synthesizing answer from tool outcomes"
        );
        let answer = synthesize_answer(&tool_results);
        self.history.push(Message::assistant(&answer));
        if !cancel.is_cancelled() {
            self.speak(&answer, SpeechKind::Answer, self.config.answer_rate);
            self.emit(RuntimeEvent::Answer {
                text: answer.clone(),
            });
        }
        Ok(TurnOutcome {
            answer,
            stop_reason: StopReason::IterationCeiling,
            iterations: self.config.max_iterations,
            tool_results,
        })
    }

    async fn send_with_retry(&self, cancel: &CancellationToken) -> Result<ModelTurn, AgentError> {
        let request_timeout =
            tokio::time::Duration::from_secs(self.config.request_timeout_secs);
        let mut attempt = 0u32;

        loop {
            let result = tokio::time::timeout(
                request_timeout,
                self.provider
                    .complete(self.history.messages(), &self.tool_definitions, &self.options),
            )
            .await;

            let error = match result {
                Ok(Ok(turn)) => return Ok(turn),
                Ok(Err(e)) => e,
                Err(_) => AgentError::ModelRequest(format!(
                    "request timed out after {}s",
                    self.config.request_timeout_secs
                )),
            };

            if !error.is_retryable() || attempt >= self.config.retry_policy.max_attempts {
                return Err(error);
            }

            attempt = attempt.saturating_add(1);
            let delay = self.config.retry_policy.delay_for_attempt(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "retrying model request");
            tokio::select! {
                () = cancel.cancelled() => return Err(error),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn speak(&self, text: &str, kind: SpeechKind, rate: f32) {
        self.queue.enqueue(SpeechItem::new(text, kind, rate));
    }

    fn emit(&self, event: RuntimeEvent) {
        if let Some(tx) = &self.runtime_tx {
            let _ = tx.send(event);
        }
    }
}

/// Extract the spoken text of a reasoning tool call.
///
/// Prefers a `thought` string argument, then the first string value in
/// the argument object. Unparsable arguments yield nothing to speak.
fn reasoning_text(arguments_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(arguments_json).ok()?;
    let obj = value.as_object()?;
    if let Some(thought) = obj.get("thought").and_then(|v| v.as_str())
        && !thought.trim().is_empty()
    {
        return Some(thought.to_owned());
    }
    obj.values()
        .find_map(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
}

/// Build the best-effort answer spoken when the iteration ceiling is hit.
///
/// Quotes the most recent successful tool outcomes; always non-empty.
fn synthesize_answer(results: &[ToolCallResult]) -> String {
    let successes: Vec<&ToolCallResult> = results
        .iter()
        .filter(|r| r.result.success && !r.result.content.trim().is_empty())
        .collect();

    if successes.is_empty() {
        return "I wasn't able to finish that within my step limit, and none of the lookups \
                returned anything useful. Could you rephrase or narrow the request?"
            .to_owned();
    }

    let mut parts = Vec::new();
    for result in successes.iter().rev().take(SYNTHESIS_MAX_SNIPPETS).rev() {
        let content = result.result.content.trim();
        let mut end = content.len().min(SYNTHESIS_SNIPPET_BYTES);
        while end > 0 && !content.is_char_boundary(end) {
            end -= 1;
        }
        parts.push(format!("{} returned: {}", result.tool_name, &content[..end]));
    }

    format!(
        "I ran out of steps before reaching a full answer. Here's what I found along the way. {}",
        parts.join(" ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::protocol::ToolServerError;
    use crate::agent::tools::stdio::ToolServer;
    use crate::agent::tools::types::{ToolCallRequest, ToolDescriptor, ToolResult};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    // ── Mock provider ────────────────────────────────────────

    /// Returns scripted turns; each call pops from the front.
    struct MockProvider {
        turns: Mutex<Vec<ModelTurn>>,
    }

    impl MockProvider {
        fn new(turns: Vec<ModelTurn>) -> Self {
            Self {
                turns: Mutex::new(turns),
            }
        }

        fn tool_call_turn(call_id: &str, tool: &str, args: &str) -> ModelTurn {
            ModelTurn {
                text: String::new(),
                tool_calls: vec![ToolCallRequest {
                    call_id: call_id.into(),
                    tool_name: tool.into(),
                    arguments_json: args.into(),
                }],
            }
        }
    }

    #[async_trait]
    impl ModelProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _options: &RequestOptions,
        ) -> Result<ModelTurn, AgentError> {
            let mut turns = self.turns.lock().unwrap_or_else(|e| e.into_inner());
            if turns.is_empty() {
                Ok(ModelTurn::text_only(""))
            } else {
                Ok(turns.remove(0))
            }
        }
    }

    /// Provider that fails N times before succeeding.
    struct FlakyProvider {
        failures_remaining: Mutex<u32>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl ModelProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _options: &RequestOptions,
        ) -> Result<ModelTurn, AgentError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let mut failures = self
                .failures_remaining
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if *failures > 0 {
                *failures -= 1;
                return Err(AgentError::ModelRequest("transient failure".into()));
            }
            Ok(ModelTurn::text_only("Recovered."))
        }
    }

    // ── Mock tool server ─────────────────────────────────────

    struct FixtureServer;

    #[async_trait]
    impl ToolServer for FixtureServer {
        fn id(&self) -> &str {
            "fixture"
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
            let schema = serde_json::json!({
                "type": "object",
                "properties": { "q": { "type": "string" } }
            });
            Ok(["search", "createNote", "think"]
                .iter()
                .map(|name| ToolDescriptor {
                    name: (*name).to_owned(),
                    description: format!("{name} tool"),
                    parameters: schema.clone(),
                    server_id: "fixture".into(),
                })
                .collect())
        }

        async fn call(
            &self,
            tool: &str,
            arguments: &serde_json::Value,
        ) -> Result<String, ToolServerError> {
            match tool {
                "search" => Ok(format!(
                    "results for {}",
                    arguments.get("q").and_then(|v| v.as_str()).unwrap_or("?")
                )),
                "think" => Ok("ok".into()),
                _ => Ok("done".into()),
            }
        }
    }

    struct Rig {
        orchestrator: ConversationOrchestrator,
        queue: Arc<SpeechQueue>,
    }

    async fn rig_with(provider: Arc<dyn ModelProvider>, config: AgentConfig) -> Rig {
        let mut registry = ToolRegistry::new();
        let _ = registry.register(Arc::new(FixtureServer)).await;
        let queue = Arc::new(SpeechQueue::new());
        let orchestrator = ConversationOrchestrator::new(
            config,
            provider,
            Arc::new(registry),
            Arc::clone(&queue),
        );
        Rig {
            orchestrator,
            queue,
        }
    }

    fn drain_items(queue: &SpeechQueue) -> Vec<SpeechItem> {
        let mut items = Vec::new();
        // The queue has no consumer in these tests; pop via the internal
        // iterator used by the scheduler.
        while !queue.is_empty() {
            if let Some((item, _)) = queue_pop(queue) {
                items.push(item);
            }
        }
        items
    }

    fn queue_pop(queue: &SpeechQueue) -> Option<(SpeechItem, tokio_util::sync::CancellationToken)> {
        // Safe in tests: the scheduler is not running.
        let fut = queue.next();
        futures_util::FutureExt::now_or_never(fut)
    }

    // ── Final answer without tools ───────────────────────────

    #[tokio::test]
    async fn text_only_turn_is_final_and_spoken() {
        let provider = Arc::new(MockProvider::new(vec![ModelTurn::text_only(
            "Hello there.",
        )]));
        let mut rig = rig_with(provider, AgentConfig::new()).await;
        let cancel = CancellationToken::new();

        let outcome = rig.orchestrator.handle_user_turn("Hi", &cancel).await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => unreachable!("turn succeeded"),
        };
        assert_eq!(outcome.answer, "Hello there.");
        assert_eq!(outcome.stop_reason, StopReason::Complete);
        assert_eq!(outcome.iterations, 1);

        let items = drain_items(&rig.queue);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, SpeechKind::Answer);
        assert!((items[0].rate - 1.0).abs() < f32::EPSILON);

        // History: system-less user + assistant.
        assert_eq!(rig.orchestrator.history().len(), 2);
    }

    // ── Tool round-trip ──────────────────────────────────────

    #[tokio::test]
    async fn tool_calls_execute_then_answer() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_call_turn("c1", "search", r#"{"q":"weather"}"#),
            ModelTurn::text_only("It's sunny."),
        ]));
        let mut rig = rig_with(provider, AgentConfig::new()).await;
        let cancel = CancellationToken::new();

        let outcome = rig
            .orchestrator
            .handle_user_turn("What's the weather?", &cancel)
            .await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => unreachable!("turn succeeded"),
        };
        assert_eq!(outcome.answer, "It's sunny.");
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.tool_results.len(), 1);
        assert_eq!(outcome.tool_results[0].call_id, "c1");
        assert!(outcome.tool_results[0].result.success);
        assert_eq!(outcome.tool_results[0].result.content, "results for weather");

        // History: user, assistant(tool call), tool result, assistant.
        assert_eq!(rig.orchestrator.history().len(), 4);
    }

    // ── Reasoning items ──────────────────────────────────────

    #[tokio::test]
    async fn reasoning_calls_are_spoken_fast_before_the_answer() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_call_turn("c1", "think", r#"{"thought":"Checking the calendar."}"#),
            ModelTurn::text_only("You're free at noon."),
        ]));
        let mut rig = rig_with(provider, AgentConfig::new()).await;
        let cancel = CancellationToken::new();

        let outcome = rig
            .orchestrator
            .handle_user_turn("Am I free at noon?", &cancel)
            .await;
        assert!(outcome.is_ok());

        let items = drain_items(&rig.queue);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, SpeechKind::Reasoning);
        assert_eq!(items[0].text, "Checking the calendar.");
        assert!((items[0].rate - 1.8).abs() < f32::EPSILON);
        assert_eq!(items[1].kind, SpeechKind::Answer);
        assert!(items[0].seq < items[1].seq);
    }

    // ── Malformed + valid call in one batch ──────────────────

    #[tokio::test]
    async fn malformed_call_does_not_block_valid_sibling() {
        let provider = Arc::new(MockProvider::new(vec![
            ModelTurn {
                text: String::new(),
                tool_calls: vec![
                    ToolCallRequest {
                        call_id: "bad".into(),
                        tool_name: "search".into(),
                        arguments_json: "{{{not json".into(),
                    },
                    ToolCallRequest {
                        call_id: "good".into(),
                        tool_name: "search".into(),
                        arguments_json: r#"{"q":"news"}"#.into(),
                    },
                ],
            },
            ModelTurn::text_only("Here's the news."),
        ]));
        let mut rig = rig_with(provider, AgentConfig::new()).await;
        let cancel = CancellationToken::new();

        let outcome = rig
            .orchestrator
            .handle_user_turn("News?", &cancel)
            .await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => unreachable!("turn succeeded"),
        };
        assert_eq!(outcome.tool_results.len(), 2);
        assert!(!outcome.tool_results[0].result.success);
        assert!(outcome.tool_results[1].result.success);
        assert_eq!(outcome.answer, "Here's the news.");
    }

    // ── Iteration ceiling ────────────────────────────────────

    #[tokio::test]
    async fn ceiling_synthesizes_nonempty_answer() {
        // 16 consecutive tool-call turns against a ceiling of 15.
        let turns: Vec<ModelTurn> = (0..16)
            .map(|i| MockProvider::tool_call_turn(&format!("c{i}"), "search", r#"{"q":"x"}"#))
            .collect();
        let provider = Arc::new(MockProvider::new(turns));
        let mut rig = rig_with(provider, AgentConfig::new()).await;
        let cancel = CancellationToken::new();

        let outcome = rig
            .orchestrator
            .handle_user_turn("Loop forever", &cancel)
            .await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => unreachable!("turn succeeded"),
        };
        assert_eq!(outcome.stop_reason, StopReason::IterationCeiling);
        assert_eq!(outcome.iterations, 15);
        assert!(!outcome.answer.trim().is_empty());
        assert!(outcome.answer.contains("results for x"));
    }

    #[tokio::test]
    async fn ceiling_with_no_successes_still_answers() {
        let config = AgentConfig::new().with_max_iterations(2);
        let turns: Vec<ModelTurn> = (0..3)
            .map(|i| MockProvider::tool_call_turn(&format!("c{i}"), "missing", "{}"))
            .collect();
        let provider = Arc::new(MockProvider::new(turns));
        let mut rig = rig_with(provider, config).await;
        let cancel = CancellationToken::new();

        let outcome = rig
            .orchestrator
            .handle_user_turn("Try anyway", &cancel)
            .await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => unreachable!("turn succeeded"),
        };
        assert_eq!(outcome.stop_reason, StopReason::IterationCeiling);
        assert!(!outcome.answer.trim().is_empty());
    }

    // ── Unknown tool feeds back as a result ──────────────────

    #[tokio::test]
    async fn unknown_tool_feeds_error_back_to_model() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_call_turn("c1", "hallucinated", "{}"),
            ModelTurn::text_only("That tool doesn't exist, sorry."),
        ]));
        let mut rig = rig_with(provider, AgentConfig::new()).await;
        let cancel = CancellationToken::new();

        let outcome = rig
            .orchestrator
            .handle_user_turn("Use a fake tool", &cancel)
            .await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => unreachable!("turn succeeded"),
        };
        assert!(!outcome.tool_results[0].result.success);
        assert_eq!(outcome.stop_reason, StopReason::Complete);
        assert_eq!(outcome.answer, "That tool doesn't exist, sorry.");
    }

    // ── Cancellation ─────────────────────────────────────────

    #[tokio::test]
    async fn cancelled_before_start_returns_without_speaking() {
        let provider = Arc::new(MockProvider::new(vec![ModelTurn::text_only("unused")]));
        let mut rig = rig_with(provider, AgentConfig::new()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = rig.orchestrator.handle_user_turn("Hi", &cancel).await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => unreachable!("turn succeeded"),
        };
        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert!(rig.queue.is_empty());
        // The user message is still recorded.
        assert_eq!(rig.orchestrator.history().len(), 1);
    }

    #[tokio::test]
    async fn cancel_after_dispatch_keeps_results_in_history() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_call_turn("c1", "search", r#"{"q":"x"}"#),
            ModelTurn::text_only("never spoken"),
        ]));
        let mut rig = rig_with(provider, AgentConfig::new()).await;
        let cancel = CancellationToken::new();

        // Cancel fires while the first dispatch batch is running.
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let outcome = rig
            .orchestrator
            .handle_user_turn("Search please", &cancel)
            .await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => unreachable!("turn succeeded"),
        };
        // Whether the cancel landed before or after the second model call,
        // nothing was spoken and the tool results are in history.
        if outcome.stop_reason == StopReason::Cancelled {
            assert!(rig.queue.is_empty());
            assert!(
                rig.orchestrator
                    .history()
                    .messages()
                    .iter()
                    .any(|m| m.role == crate::agent::message::Role::Tool)
            );
        }
    }

    // ── Model failures ───────────────────────────────────────

    #[tokio::test]
    async fn transient_model_failure_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = Arc::new(FlakyProvider {
            failures_remaining: Mutex::new(1),
            calls: Arc::clone(&calls),
        });
        let config = AgentConfig::new().with_retry_policy(
            crate::agent::types::RetryPolicy::new()
                .with_max_attempts(3)
                .with_base_delay_ms(1)
                .with_max_delay_ms(5),
        );
        let mut rig = rig_with(provider, config).await;
        let cancel = CancellationToken::new();

        let outcome = rig.orchestrator.handle_user_turn("retry", &cancel).await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => unreachable!("turn succeeded"),
        };
        assert_eq!(outcome.answer, "Recovered.");
        assert!(calls.load(Ordering::Relaxed) >= 2);
    }

    #[tokio::test]
    async fn persistent_model_failure_propagates() {
        let provider = Arc::new(FlakyProvider {
            failures_remaining: Mutex::new(100),
            calls: Arc::new(AtomicU32::new(0)),
        });
        let config = AgentConfig::new().with_retry_policy(
            crate::agent::types::RetryPolicy::new()
                .with_max_attempts(2)
                .with_base_delay_ms(1)
                .with_max_delay_ms(2),
        );
        let mut rig = rig_with(provider, config).await;
        let cancel = CancellationToken::new();

        let result = rig.orchestrator.handle_user_turn("fail", &cancel).await;
        assert!(matches!(result, Err(AgentError::ModelRequest(_))));
    }

    // ── clear_history ────────────────────────────────────────

    #[tokio::test]
    async fn clear_history_resets_to_system_turn() {
        let provider = Arc::new(MockProvider::new(vec![ModelTurn::text_only("Hi!")]));
        let config = AgentConfig::new().with_system_prompt("Be concise.");
        let mut rig = rig_with(provider, config).await;
        let cancel = CancellationToken::new();

        let _ = rig.orchestrator.handle_user_turn("Hello", &cancel).await;
        assert!(rig.orchestrator.history().len() > 1);

        rig.orchestrator.clear_history();
        assert_eq!(rig.orchestrator.history().len(), 1);
    }

    // ── Helpers ──────────────────────────────────────────────

    #[test]
    fn reasoning_text_prefers_thought_key() {
        let text = reasoning_text(r#"{"note":"x","thought":"the plan"}"#);
        assert_eq!(text.as_deref(), Some("the plan"));
    }

    #[test]
    fn reasoning_text_falls_back_to_first_string() {
        let text = reasoning_text(r#"{"message":"checking things"}"#);
        assert_eq!(text.as_deref(), Some("checking things"));
    }

    #[test]
    fn reasoning_text_rejects_garbage() {
        assert!(reasoning_text("{{{").is_none());
        assert!(reasoning_text(r#"{"n":3}"#).is_none());
        assert!(reasoning_text(r#"{"thought":"  "}"#).is_none());
    }

    #[test]
    fn synthesize_answer_quotes_recent_successes() {
        let results = vec![
            ToolCallResult {
                call_id: "c1".into(),
                tool_name: "search".into(),
                result: ToolResult::success("first finding".into()),
                duration_ms: 1,
            },
            ToolCallResult {
                call_id: "c2".into(),
                tool_name: "createNote".into(),
                result: ToolResult::failure("nope".into()),
                duration_ms: 1,
            },
        ];
        let answer = synthesize_answer(&results);
        assert!(answer.contains("search returned: first finding"));
        assert!(!answer.contains("nope"));
    }

    #[test]
    fn synthesize_answer_without_successes_is_nonempty() {
        let answer = synthesize_answer(&[]);
        assert!(!answer.trim().is_empty());
    }
}
