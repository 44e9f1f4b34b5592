//! Cancellation gate
//!
//! Binds one cancellation token and one task abort handle to the transport of
//! a single session. Triggering is idempotent and safe after the transport
//! has already finished on its own.

use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::session::SessionId;

pub struct CancellationGate {
    session: SessionId,
    token: CancellationToken,
    task: Option<AbortHandle>,
    triggered: bool,
}

impl CancellationGate {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            token: CancellationToken::new(),
            task: None,
            triggered: false,
        }
    }

    /// Token observed by the transport task
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Bind the spawned transport task so triggering can abort it outright
    pub fn bind(&mut self, task: AbortHandle) {
        if self.triggered {
            // Cancelled before the task was even bound
            task.abort();
            return;
        }
        self.task = Some(task);
    }

    /// Abort the transport. Returns true only for the call that actually fired.
    pub fn trigger(&mut self) -> bool {
        if self.triggered {
            return false;
        }
        self.triggered = true;
        self.token.cancel();
        if let Some(task) = self.task.take() {
            // No-op when the task already ran to completion
            task.abort();
        }
        debug!(session = %self.session, "Cancellation gate triggered");
        true
    }

    /// Drop the transport handle after a natural terminal transition
    pub fn release(&mut self) {
        self.token.cancel();
        self.task = None;
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }
}
