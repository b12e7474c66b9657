//! Conversation orchestration over model providers and tool servers.
//!
//! This module implements the iterative tool-calling loop: submit the
//! conversation to the model, execute the tool calls it requests, feed the
//! results back, and repeat until a final answer (or the iteration
//! ceiling, which synthesizes one). Reasoning tool calls are forwarded to
//! the speech queue as they appear so multi-step turns stay audible.
//!
//! # Architecture
//!
//! ```text
//! ConversationOrchestrator
//!   +-- AgentConfig (ceiling, timeouts, rates, retry policy)
//!   +-- ModelProvider (LLM backend)
//!   +-- ToolDispatcher -> ToolRegistry -> ToolServer adapters
//!   +-- SpeechQueue (reasoning + answer items)
//! ```
//!
//! # Key Types
//!
//! - [`AgentConfig`] — loop configuration
//! - [`ConversationOrchestrator`] — the turn-processing loop
//! - [`TurnOutcome`] / [`StopReason`] — why and how a turn ended
//! - [`ToolDispatcher`] — bounded-parallel, order-preserving dispatch
//! - [`tools::ToolRegistry`] — the flat tool namespace over N servers
//! - [`AgentError`] — errors with stable codes

pub mod dispatcher;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod tools;
pub mod types;

pub use dispatcher::ToolDispatcher;
pub use error::AgentError;
pub use message::{AssistantToolCall, ChatHistory, Message, MessageContent, Role};
pub use orchestrator::ConversationOrchestrator;
pub use provider::{ModelProvider, ModelTurn, RequestOptions, ToolDefinition};
pub use providers::{OpenAiAdapter, OpenAiConfig};
pub use types::{AgentConfig, RetryPolicy, StopReason, TurnOutcome};
