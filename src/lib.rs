//! Aria: voice-driven conversational agent core.
//!
//! This crate provides the runtime that coordinates a voice session's
//! three concurrent activities:
//! - **Agent loop**: iterative model tool-calling against dynamically
//!   discovered external tool servers
//! - **Speech output**: a sequential playback queue that is interruptible
//!   the instant the user starts talking
//! - **Session coordination**: a duplex state machine that keeps the
//!   system from listening to its own voice while staying responsive to
//!   barge-in
//!
//! # Architecture
//!
//! Independent tasks connected by channels, coordinated through the
//! [`SessionCoordinator`]'s state and explicit cancellation:
//! - **Tool registry**: discovers catalogs from stdio JSON-RPC tool
//!   servers and exposes one flat namespace
//! - **Orchestrator**: drives model turns and tool dispatch, emitting
//!   reasoning fragments and the final answer as speech items
//! - **Speech scheduler**: plays items strictly in order through
//!   black-box synthesis/output engines
//! - **Session coordinator**: gates capture, handles barge-in, and
//!   publishes every transition to observers
//!
//! The acoustic engines, the tool-server implementations, and any UI are
//! external collaborators behind the [`speech`] traits, the tool-server
//! protocol, and the [`RuntimeEvent`] stream.

pub mod agent;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod runtime;
pub mod session;
pub mod speech;

pub use agent::{
    AgentConfig, AgentError, ConversationOrchestrator, ModelProvider, OpenAiAdapter, OpenAiConfig,
};
pub use config::{ModelConfig, SessionConfig};
pub use error::{AriaError, Result};
pub use runtime::RuntimeEvent;
pub use session::{SessionCoordinator, SessionHandle, SessionPhase, SessionState};
pub use speech::{SpeechQueue, SpeechScheduler};
