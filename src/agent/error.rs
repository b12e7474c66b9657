//! Error types for the agent subsystem.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via
//! [`AgentError::code()`]. Codes are part of the public API contract and
//! will not change.

/// Stable error codes for programmatic error handling.
///
/// These codes never change and form part of the public API contract.
/// Use these for distinguishing errors rather than parsing Display output.
pub mod error_codes {
    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Authentication failed (invalid/missing API key).
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// Request to the model provider failed.
    pub const MODEL_REQUEST_FAILED: &str = "MODEL_REQUEST_FAILED";

    /// The named tool is not served by any connected server.
    pub const TOOL_UNAVAILABLE: &str = "TOOL_UNAVAILABLE";

    /// The tool ran but reported a failure.
    pub const TOOL_FAILED: &str = "TOOL_FAILED";

    /// A tool call exceeded its execution deadline.
    pub const TOOL_TIMEOUT: &str = "TOOL_TIMEOUT";

    /// Speech synthesis or playback failed.
    pub const AUDIO_ENGINE_FAILED: &str = "AUDIO_ENGINE_FAILED";
}

/// Errors produced by the agent subsystem.
///
/// Each variant includes a stable error code accessible via
/// [`AgentError::code()`]. The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// Authentication failed (invalid/missing API key).
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    Auth(String),

    /// Request to the model provider failed.
    #[error("[{}] {}", error_codes::MODEL_REQUEST_FAILED, .0)]
    ModelRequest(String),

    /// The named tool is not served by any connected server.
    #[error("[{}] {}", error_codes::TOOL_UNAVAILABLE, .0)]
    ToolUnavailable(String),

    /// The tool ran but reported a failure.
    #[error("[{}] {}", error_codes::TOOL_FAILED, .0)]
    ToolExecution(String),

    /// A tool call exceeded its execution deadline.
    #[error("[{}] {}", error_codes::TOOL_TIMEOUT, .0)]
    ToolTimeout(String),

    /// Speech synthesis or playback failed.
    #[error("[{}] {}", error_codes::AUDIO_ENGINE_FAILED, .0)]
    AudioEngine(String),
}

impl AgentError {
    /// Returns the stable error code for this error.
    ///
    /// Codes are SCREAMING_SNAKE_CASE strings that remain stable across
    /// releases. Use these for programmatic error handling rather than
    /// parsing Display output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Auth(_) => error_codes::AUTH_FAILED,
            Self::ModelRequest(_) => error_codes::MODEL_REQUEST_FAILED,
            Self::ToolUnavailable(_) => error_codes::TOOL_UNAVAILABLE,
            Self::ToolExecution(_) => error_codes::TOOL_FAILED,
            Self::ToolTimeout(_) => error_codes::TOOL_TIMEOUT,
            Self::AudioEngine(_) => error_codes::AUDIO_ENGINE_FAILED,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Auth(m)
            | Self::ModelRequest(m)
            | Self::ToolUnavailable(m)
            | Self::ToolExecution(m)
            | Self::ToolTimeout(m)
            | Self::AudioEngine(m) => m,
        }
    }

    /// Returns true if this error represents a transient failure that can
    /// be retried.
    ///
    /// Retryable: model request failures (network errors, rate limits,
    /// server errors). Everything else is not — tool failures are resolved
    /// into results instead of being retried, and auth/config failures need
    /// a fix, not a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ModelRequest(_) => true,
            Self::Config(_)
            | Self::Auth(_)
            | Self::ToolUnavailable(_)
            | Self::ToolExecution(_)
            | Self::ToolTimeout(_)
            | Self::AudioEngine(_) => false,
        }
    }
}

/// Convenience alias for agent results.
pub type Result<T> = std::result::Result<T, AgentError>;
