//! Session records
//!
//! A session owns exactly one remote operation (a chat turn or a build run).
//! Ids double as generation numbers: every id handed out is larger than the
//! previous one, so a stale event can never be mistaken for a live one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{ErrorKind, PipelineError};

/// Identifier of one session, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Monotonic id source shared by every slot in a process
#[derive(Debug, Clone)]
pub struct SessionIds {
    next: Arc<AtomicU64>,
}

impl SessionIds {
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate the next id
    pub fn next_id(&self) -> SessionId {
        SessionId(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for SessionIds {
    fn default() -> Self {
        Self::new()
    }
}

/// What kind of remote operation a session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Chat,
    Build,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Chat => f.write_str("chat"),
            SessionKind::Build => f.write_str("build"),
        }
    }
}

/// Session lifecycle
///
/// `Idle → Starting → Streaming → {Completed | Failed | Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Streaming => "streaming",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Why a session failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PipelineError> for ErrorDetail {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Bookkeeping for one session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionKind,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub error_detail: Option<ErrorDetail>,
}

impl Session {
    pub fn new(id: SessionId, kind: SessionKind) -> Self {
        Self {
            id,
            kind,
            state: SessionState::Idle,
            started_at: Utc::now(),
            error_detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic_across_clones() {
        let ids = SessionIds::new();
        let other = ids.clone();
        let a = ids.next_id();
        let b = other.next_id();
        let c = ids.next_id();
        assert!(a < b && b < c);
        assert_eq!(a.to_string(), "s1");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Starting.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new(SessionIds::new().next_id(), SessionKind::Build);
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.error_detail.is_none());
    }
}
