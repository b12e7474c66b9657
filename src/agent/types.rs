//! Configuration and result types for the conversation orchestrator.
//!
//! Provides [`AgentConfig`] for controlling loop behavior (iteration
//! ceiling, timeouts, playback rates) and [`TurnOutcome`] for the result of
//! one user turn.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::tools::types::ToolCallResult;

/// Default iteration ceiling for one user turn.
pub const DEFAULT_MAX_ITERATIONS: u32 = 15;

/// Default model request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default per-tool execution timeout in seconds.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Default playback rate for reasoning fragments.
pub const DEFAULT_REASONING_RATE: f32 = 1.8;

/// Default playback rate for the final answer.
pub const DEFAULT_ANSWER_RATE: f32 = 1.0;

/// Default sliding-window bound on conversation history entries.
pub const DEFAULT_MAX_HISTORY_ENTRIES: usize = 200;

/// Default maximum retry attempts for transient model errors.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default maximum delay for exponential backoff in milliseconds.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 32000;

/// Default backoff multiplier.
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Retry policy for transient model request failures.
///
/// Exponential backoff with jitter. Only retryable errors (network
/// failures, rate limits, server errors) are retried; auth and config
/// failures surface immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth).
    pub max_delay_ms: u64,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retry attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay in milliseconds.
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set the maximum delay in milliseconds.
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Calculate the delay for a given retry attempt with exponential
    /// backoff and jitter.
    ///
    /// Formula: min(base * multiplier^(attempt-1), max_delay) + jitter,
    /// where jitter is 0–10% of the delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let base = self.base_delay_ms as f64;
        let exp = self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay = (base * exp).min(self.max_delay_ms as f64);
        let jitter = delay * (rand::random::<f64>() * 0.1);

        Duration::from_millis((delay + jitter) as u64)
    }
}

/// Configuration for the conversation orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Iteration ceiling for one user turn. Reaching it triggers
    /// best-effort answer synthesis, never a turn failure.
    pub max_iterations: u32,
    /// Deadline for each model request in seconds.
    pub request_timeout_secs: u64,
    /// Deadline for each tool call in seconds.
    pub tool_timeout_secs: u64,
    /// Concurrency ceiling for tool calls within one model turn
    /// (0 = unlimited).
    pub max_parallel_tool_calls: usize,
    /// System prompt seeding the conversation.
    pub system_prompt: Option<String>,
    /// Tool names treated as reasoning/thinking calls and spoken as
    /// intermediate feedback.
    pub reasoning_tools: Vec<String>,
    /// Playback rate multiplier for reasoning fragments.
    pub reasoning_rate: f32,
    /// Playback rate multiplier for the final answer.
    pub answer_rate: f32,
    /// Sliding-window bound on conversation history entries.
    pub max_history_entries: usize,
    /// Retry policy for transient model failures.
    pub retry_policy: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            max_parallel_tool_calls: 0,
            system_prompt: None,
            reasoning_tools: vec!["think".to_owned()],
            reasoning_rate: DEFAULT_REASONING_RATE,
            answer_rate: DEFAULT_ANSWER_RATE,
            max_history_entries: DEFAULT_MAX_HISTORY_ENTRIES,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl AgentConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration ceiling.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the model request timeout.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the per-tool timeout.
    pub fn with_tool_timeout_secs(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// True if the named tool is a reasoning/thinking call.
    pub fn is_reasoning_tool(&self, name: &str) -> bool {
        self.reasoning_tools.iter().any(|t| t == name)
    }
}

/// Why a user turn stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The model produced a final answer.
    Complete,
    /// The iteration ceiling was reached; the answer was synthesized from
    /// tool outcomes.
    IterationCeiling,
    /// The turn was interrupted; results were recorded but not spoken.
    Cancelled,
}

/// The outcome of one user turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Final answer text (always non-empty unless cancelled).
    pub answer: String,
    /// Why the turn ended.
    pub stop_reason: StopReason,
    /// Number of model round-trips performed.
    pub iterations: u32,
    /// Every tool call executed during the turn, in execution order.
    pub tool_results: Vec<ToolCallResult>,
}
