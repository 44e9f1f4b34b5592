//! Pipeline error types

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::SessionState;

/// Errors produced while driving a remote operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Opening or reading the transport failed (refused, non-success status, broken stream)
    #[error("transport error: {0}")]
    Transport(String),

    /// The client-side deadline elapsed
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The connection was fine but the remote operation reported failure
    #[error("remote operation failed: {0}")]
    Remote(String),

    /// A frame could not be decoded; recovered locally by dropping it
    #[error("malformed frame: {0}")]
    Decode(String),

    /// The session was stopped by the user; informational, never a failure
    #[error("stopped by user")]
    CancelledByUser,

    /// An operation was invoked from a state that does not allow it
    #[error("cannot {action} a session that is {from}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },
}

impl PipelineError {
    /// Classify this error for the session's error detail
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Transport(_) => ErrorKind::Transport,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
            PipelineError::Remote(_) => ErrorKind::Remote,
            PipelineError::Decode(_) => ErrorKind::Decode,
            PipelineError::CancelledByUser => ErrorKind::CancelledByUser,
            PipelineError::InvalidTransition { .. } => ErrorKind::Transport,
        }
    }

    /// Build a transport error from an HTTP status and response body
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if body.is_empty() {
            PipelineError::Transport(format!("server responded {}", status))
        } else {
            PipelineError::Transport(format!("server responded {}: {}", status, body))
        }
    }
}

/// Timeouts are mapped by `BackendClient`, which knows the configured duration
impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for PipelineError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        PipelineError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

/// Error classification recorded on a terminal session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Timeout,
    Remote,
    Decode,
    CancelledByUser,
    Render,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Remote => "remote",
            ErrorKind::Decode => "decode",
            ErrorKind::CancelledByUser => "cancelled",
            ErrorKind::Render => "render",
        };
        f.write_str(label)
    }
}

/// Errors raised while materializing content into a preview surface
#[derive(Debug, Error)]
pub enum RenderError {
    /// Writing the document to its backing store failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The surface refused the document
    #[error("surface rejected document: {0}")]
    Rejected(String),
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Render
    }
}
