//! Error types for the aria session core.

/// Top-level error type for the voice agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AriaError {
    /// Audio playback or synthesis error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech output scheduling error.
    #[error("speech error: {0}")]
    Speech(String),

    /// Session coordination error.
    #[error("session error: {0}")]
    Session(String),

    /// Tool server connection or protocol error.
    #[error("tool server error: {0}")]
    ToolServer(String),

    /// Agent loop error (model request, tool dispatch).
    #[error(transparent)]
    Agent(#[from] crate::agent::error::AgentError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AriaError>;
