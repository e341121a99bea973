//! Error taxonomy shared by every stage of a turn.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can end or redirect a conversation turn.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChatError {
    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream error: {0}")]
    UpstreamError(String),

    #[error("LLM error: {0}")]
    LlmError(String),
}

impl ChatError {
    /// The serializable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::InvalidSession(_) => ErrorKind::InvalidSession,
            ChatError::UnknownTool(_) => ErrorKind::UnknownTool,
            ChatError::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            ChatError::NotFound(_) => ErrorKind::NotFound,
            ChatError::RateLimited(_) => ErrorKind::RateLimited,
            ChatError::UpstreamError(_) => ErrorKind::UpstreamError,
            ChatError::LlmError(_) => ErrorKind::LlmError,
        }
    }

    /// Whether a single retry is allowed for this error.
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }

    /// Convert into the `{kind, message}` shape sent to callers and the LLM.
    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<claude::Error> for ChatError {
    fn from(err: claude::Error) -> Self {
        ChatError::LlmError(err.to_string())
    }
}

/// Category of a [`ChatError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidSession,
    UnknownTool,
    InvalidArguments,
    NotFound,
    RateLimited,
    UpstreamError,
    LlmError,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::UpstreamError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidSession => "invalid_session",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::InvalidArguments => "invalid_arguments",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::LlmError => "llm_error",
        };
        f.write_str(name)
    }
}

/// Error payload carried in responses, tool messages and log entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

/// Errors raised while starting the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("Claude client error: {0}")]
    Claude(#[from] claude::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
