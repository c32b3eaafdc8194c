//! Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

/// Failures on a provider's stdin/stdout channel
#[derive(Error, Debug)]
pub enum TransportError {
    /// The provider process was never started or has been stopped
    #[error("provider process not started")]
    NotStarted,

    /// The child closed its end of the pipe
    #[error("pipe closed by provider")]
    PipeClosed,

    /// No response line arrived in time
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// A line arrived but was not a JSON-RPC response
    #[error("malformed response line: {0}")]
    Malformed(String),

    /// Underlying pipe I/O failed
    #[error("pipe I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Warden error types
#[derive(Error, Debug)]
pub enum WardenError {
    /// Provider channel failure (process not started, pipe closed, bad line)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Well-formed JSON-RPC error returned by a provider
    #[error("Protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// Arguments do not match the tool's declared schema
    #[error("Validation error: {0}")]
    Validation(String),

    /// No tool with this name is advertised by a connected provider
    #[error("Tool not found: {name}")]
    ToolNotFound {
        name: String,
        available_tools: Vec<String>,
    },

    /// No decision object could be recovered from model output
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or invalid provider configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Language model backend error
    #[error("Model error: {0}")]
    Provider(String),

    /// Language model backend unavailable or not responding
    #[error("Model unavailable: {0}")]
    ProviderUnavailable(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl WardenError {
    /// Whether a later attempt could succeed. Nothing in the warden retries on
    /// its own; callers may use this to decide what to surface.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_)
                | Self::Transport(TransportError::Timeout(_))
                | Self::Io(_)
        )
    }

    /// Stable short code used in tool envelopes and HTTP error bodies
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Protocol { .. } => "protocol",
            Self::Validation(_) => "validation",
            Self::ToolNotFound { .. } => "tool_not_found",
            Self::Parse(_) => "parse",
            Self::Config(_) => "config",
            Self::Provider(_) | Self::ProviderUnavailable(_) => "model",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(e) => format!("A tool provider stopped responding: {e}"),
            Self::Protocol { message, .. } => format!("The tool provider reported an error: {message}"),
            Self::Validation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolNotFound { name, .. } => format!("The tool '{name}' is not available."),
            Self::Parse(_) => "The model's reply could not be understood.".into(),
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for WardenError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
