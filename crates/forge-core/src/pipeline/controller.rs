//! Session controller
//!
//! Finite-state machine owning exactly one remote operation. The controller
//! never touches the network itself: the slot spawns the transport task and
//! feeds back what it observes through `on_event`, `on_closed`, and `fail`.

use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::accumulator::{Accumulator, ArtifactUpdate, Outcome};
use super::cancellation::CancellationGate;
use super::session::{ErrorDetail, Session, SessionId, SessionKind, SessionState};
use crate::error::PipelineError;

/// Observable effect of one controller step
#[derive(Debug, Default)]
pub struct Step {
    pub updates: Vec<ArtifactUpdate>,
    /// New state, when the step changed it
    pub transition: Option<SessionState>,
}

impl Step {
    fn ignored() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.updates.is_empty() && self.transition.is_none()
    }
}

pub struct SessionController<A: Accumulator> {
    session: Session,
    gate: CancellationGate,
    artifact: A,
}

impl<A: Accumulator> SessionController<A> {
    pub fn new(id: SessionId, kind: SessionKind) -> Self {
        Self {
            session: Session::new(id, kind),
            gate: CancellationGate::new(id),
            artifact: A::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.session.id
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn artifact(&self) -> &A {
        &self.artifact
    }

    pub fn is_terminal(&self) -> bool {
        self.session.state.is_terminal()
    }

    /// `Idle → Starting`; hands out the token the transport must observe
    pub fn start(&mut self) -> Result<CancellationToken, PipelineError> {
        if self.session.state != SessionState::Idle {
            return Err(PipelineError::InvalidTransition {
                from: self.session.state,
                action: "start",
            });
        }
        self.session.state = SessionState::Starting;
        info!(session = %self.session.id, kind = %self.session.kind, "Session starting");
        Ok(self.gate.token())
    }

    /// Bind the spawned transport task to this session's gate
    pub fn attach(&mut self, task: AbortHandle) {
        self.gate.bind(task);
    }

    /// Apply one decoded event
    pub fn on_event(&mut self, event: A::Event) -> Step {
        let opens_stream = match self.session.state {
            SessionState::Starting => A::opens_stream(&event),
            SessionState::Streaming => false,
            SessionState::Idle => {
                warn!(session = %self.session.id, "Event before start ignored: {:?}", event);
                return Step::ignored();
            }
            state => {
                debug!(session = %self.session.id, %state, "Late event ignored: {:?}", event);
                return Step::ignored();
            }
        };
        if opens_stream {
            self.session.state = SessionState::Streaming;
            debug!(session = %self.session.id, "First event received, streaming");
        }

        let applied = self.artifact.apply(event);
        let mut step = Step {
            updates: applied.updates,
            transition: None,
        };

        match applied.outcome {
            Some(Outcome::Completed) => self.finish(SessionState::Completed, None, &mut step),
            Some(Outcome::Failed(err)) => self.finish_failed(&err, &mut step),
            None if opens_stream => step.transition = Some(SessionState::Streaming),
            None => {}
        }
        step
    }

    /// The transport closed on its own
    pub fn on_closed(&mut self) -> Step {
        let mut step = Step::ignored();
        if self.is_terminal() {
            return step;
        }
        match self.artifact.outcome_on_close() {
            Outcome::Completed => self.finish(SessionState::Completed, None, &mut step),
            Outcome::Failed(err) => self.finish_failed(&err, &mut step),
        }
        step
    }

    /// The transport failed to open, broke mid-stream, or timed out
    pub fn fail(&mut self, err: &PipelineError) -> Step {
        let mut step = Step::ignored();
        if self.is_terminal() {
            debug!(session = %self.session.id, "Failure after terminal state ignored: {}", err);
            return step;
        }
        if matches!(err, PipelineError::CancelledByUser) {
            return self.cancel();
        }
        self.finish_failed(err, &mut step);
        step
    }

    /// Stop the session; a no-op once terminal
    pub fn cancel(&mut self) -> Step {
        let mut step = Step::ignored();
        if self.is_terminal() {
            return step;
        }
        self.gate.trigger();
        let marker = self.artifact.stopped_marker();
        step.updates.push(self.artifact.record_notice(marker));
        self.session.state = SessionState::Cancelled;
        step.transition = Some(SessionState::Cancelled);
        info!(session = %self.session.id, "Session stopped by user");
        step
    }

    /// Every failure leaves a visible notice in the artifact
    fn finish_failed(&mut self, err: &PipelineError, step: &mut Step) {
        warn!(session = %self.session.id, "Session failed: {}", err);
        let notice = format!("[error: {}]", err);
        step.updates.push(self.artifact.record_notice(&notice));
        self.finish(SessionState::Failed, Some(err), step);
    }

    fn finish(&mut self, state: SessionState, err: Option<&PipelineError>, step: &mut Step) {
        self.session.state = state;
        self.session.error_detail = err.map(ErrorDetail::from);
        self.gate.release();
        step.transition = Some(state);
        info!(session = %self.session.id, %state, "Session finished");
    }
}
