//! Active-session slot
//!
//! Owns the single active session of one logical conversation or build slot.
//! Transport tasks never touch the controller directly; they post envelopes
//! tagged with their session id into the slot's inbox, and the owner applies
//! them one at a time. Every envelope passes the generation guard: anything
//! not addressed to the currently active session is dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::accumulator::Accumulator;
use super::controller::{SessionController, Step};
use super::session::{SessionId, SessionIds, SessionKind, SessionState};
use crate::bus::{EventBus, PipelineEvent};
use crate::error::PipelineError;

/// Event type produced by a transport
pub type TransportEvent<T> = <<T as Transport>::Artifact as Accumulator>::Event;

/// A remote operation that streams events into a session
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Request: Send + 'static;
    type Artifact: Accumulator;

    fn kind(&self) -> SessionKind;

    /// Client-side deadline for the whole operation, if any
    fn deadline(&self, _request: &Self::Request) -> Option<Duration> {
        None
    }

    /// Open the transport and push events into `sink` until the remote side is done.
    ///
    /// Returning `Ok(())` means the stream closed naturally.
    async fn run(
        &self,
        request: Self::Request,
        sink: EventSink<TransportEvent<Self>>,
    ) -> Result<(), PipelineError>;
}

/// What a transport task observed
#[derive(Debug)]
pub enum Signal<E> {
    Event(E),
    Closed,
    Failed(PipelineError),
}

/// A signal tagged with the session it belongs to
#[derive(Debug)]
pub struct Envelope<E> {
    pub session: SessionId,
    pub signal: Signal<E>,
}

impl<E> Envelope<E> {
    pub fn event(session: SessionId, event: E) -> Self {
        Self {
            session,
            signal: Signal::Event(event),
        }
    }

    pub fn closed(session: SessionId) -> Self {
        Self {
            session,
            signal: Signal::Closed,
        }
    }

    pub fn failed(session: SessionId, err: PipelineError) -> Self {
        Self {
            session,
            signal: Signal::Failed(err),
        }
    }
}

/// Transport-side handle for posting events of one session
pub struct EventSink<E> {
    session: SessionId,
    tx: mpsc::UnboundedSender<Envelope<E>>,
    token: CancellationToken,
}

impl<E> EventSink<E> {
    pub fn new(
        session: SessionId,
        tx: mpsc::UnboundedSender<Envelope<E>>,
        token: CancellationToken,
    ) -> Self {
        Self { session, tx, token }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Post one event. Fails with `CancelledByUser` once the session was stopped,
    /// so transports can bail out with `?`.
    pub fn emit(&self, event: E) -> Result<(), PipelineError> {
        if self.token.is_cancelled() {
            return Err(PipelineError::CancelledByUser);
        }
        self.tx
            .send(Envelope::event(self.session, event))
            .map_err(|_| PipelineError::CancelledByUser)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Report how the transport ended; silent when the session was stopped
    fn finish(&self, result: Result<(), PipelineError>) {
        if self.token.is_cancelled() {
            debug!(session = %self.session, "Transport ended after cancellation");
            return;
        }
        let envelope = match result {
            Ok(()) => Envelope::closed(self.session),
            Err(PipelineError::CancelledByUser) => return,
            Err(err) => Envelope::failed(self.session, err),
        };
        let _ = self.tx.send(envelope);
    }
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            session: self.session,
            tx: self.tx.clone(),
            token: self.token.clone(),
        }
    }
}

/// Receiving end of a slot's envelopes
pub struct Inbox<E> {
    rx: mpsc::UnboundedReceiver<Envelope<E>>,
}

impl<E> Inbox<E> {
    pub async fn recv(&mut self) -> Option<Envelope<E>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope<E>> {
        self.rx.try_recv().ok()
    }
}

/// How an envelope was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Applied to the active session
    Applied,
    /// Addressed to a superseded session and dropped
    Stale,
    /// Addressed to the active session but it no longer accepts input
    Ignored,
}

pub struct SessionSlot<T: Transport> {
    transport: Arc<T>,
    active: Option<SessionController<T::Artifact>>,
    tx: mpsc::UnboundedSender<Envelope<TransportEvent<T>>>,
    ids: SessionIds,
    bus: EventBus<PipelineEvent>,
}

impl<T: Transport> SessionSlot<T> {
    /// Create a slot and the inbox its transports post into
    pub fn new(
        transport: T,
        ids: SessionIds,
        bus: EventBus<PipelineEvent>,
    ) -> (Self, Inbox<TransportEvent<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let slot = Self {
            transport: Arc::new(transport),
            active: None,
            tx,
            ids,
            bus,
        };
        (slot, Inbox { rx })
    }

    /// Start a new session, superseding any session still in flight
    pub fn start(&mut self, request: T::Request) -> SessionId {
        if let Some(previous) = self.active.as_mut() {
            if !previous.is_terminal() {
                info!(session = %previous.id(), "Superseding in-flight session");
                let step = previous.cancel();
                publish_step(&self.bus, previous.id(), step);
            }
        }

        let id = self.ids.next_id();
        let kind = self.transport.kind();
        let mut controller = SessionController::new(id, kind);
        self.bus.publish(PipelineEvent::SessionStarted { id, kind });

        let token = match controller.start() {
            Ok(token) => token,
            Err(err) => {
                let step = controller.fail(&err);
                publish_step(&self.bus, id, step);
                self.active = Some(controller);
                return id;
            }
        };
        self.bus.publish(PipelineEvent::StateChanged {
            id,
            state: SessionState::Starting,
        });

        let deadline = self.transport.deadline(&request);
        let sink = EventSink::new(id, self.tx.clone(), token);
        let transport = Arc::clone(&self.transport);
        let task = tokio::spawn(drive(transport, request, sink, deadline));
        controller.attach(task.abort_handle());

        self.active = Some(controller);
        id
    }

    /// Stop the active session. Returns false when there was nothing to stop.
    pub fn cancel(&mut self) -> bool {
        let Some(controller) = self.active.as_mut() else {
            return false;
        };
        let id = controller.id();
        let step = controller.cancel();
        let fired = !step.is_noop();
        publish_step(&self.bus, id, step);
        fired
    }

    /// Apply one envelope, subject to the generation guard
    pub fn apply(&mut self, envelope: Envelope<TransportEvent<T>>) -> Delivery {
        let Some(controller) = self
            .active
            .as_mut()
            .filter(|controller| controller.id() == envelope.session)
        else {
            debug!(
                session = %envelope.session,
                active = ?self.active_id(),
                "Dropping envelope for superseded session"
            );
            return Delivery::Stale;
        };

        let id = controller.id();
        let step = match envelope.signal {
            Signal::Event(event) => controller.on_event(event),
            Signal::Closed => controller.on_closed(),
            Signal::Failed(err) => controller.fail(&err),
        };

        if step.is_noop() {
            return Delivery::Ignored;
        }
        publish_step(&self.bus, id, step);
        Delivery::Applied
    }

    /// Apply envelopes until the active session reaches a terminal state
    pub async fn run_until_settled(&mut self, inbox: &mut Inbox<TransportEvent<T>>) {
        while !self.is_settled() {
            match inbox.recv().await {
                Some(envelope) => {
                    self.apply(envelope);
                }
                None => {
                    warn!("Session inbox closed unexpectedly");
                    break;
                }
            }
        }
    }

    pub fn active(&self) -> Option<&SessionController<T::Artifact>> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(SessionController::id)
    }

    /// True when no session is in flight
    pub fn is_settled(&self) -> bool {
        self.active
            .as_ref()
            .map_or(true, SessionController::is_terminal)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn publish_step(bus: &EventBus<PipelineEvent>, id: SessionId, step: Step) {
    for update in step.updates {
        bus.publish(PipelineEvent::Updated { id, update });
    }
    if let Some(state) = step.transition {
        bus.publish(PipelineEvent::StateChanged { id, state });
    }
}

/// Run one transport to completion, racing it against cancellation and its deadline
async fn drive<T: Transport>(
    transport: Arc<T>,
    request: T::Request,
    sink: EventSink<TransportEvent<T>>,
    deadline: Option<Duration>,
) {
    let token = sink.token.clone();
    let session = sink.session();
    let run = transport.run(request, sink.clone());

    let work = async {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(session = %session, "Deadline of {:?} exceeded", limit);
                    Err(PipelineError::Timeout(limit))
                }
            },
            None => run.await,
        }
    };

    let result = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(session = %session, "Transport dropped on cancellation");
            return;
        }
        result = work => result,
    };
    sink.finish(result);
}
