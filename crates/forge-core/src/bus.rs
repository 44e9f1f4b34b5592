//! Typed publish/subscribe
//!
//! A thin wrapper over a tokio broadcast channel, parameterized over a closed
//! event enum so subscribers match exhaustively. Broadcast subscribers that
//! fall behind skip events; observers that render deltas and must see every
//! event in order take a `tap` instead.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use crate::constants::pipeline::EVENT_BUS_CAPACITY;
use crate::pipeline::{ArtifactUpdate, SessionId, SessionKind, SessionState};

/// Everything a pipeline slot reports to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    SessionStarted {
        id: SessionId,
        kind: SessionKind,
    },
    StateChanged {
        id: SessionId,
        state: SessionState,
    },
    Updated {
        id: SessionId,
        update: ArtifactUpdate,
    },
}

impl PipelineEvent {
    /// Session the event belongs to
    pub fn session(&self) -> SessionId {
        match self {
            PipelineEvent::SessionStarted { id, .. }
            | PipelineEvent::StateChanged { id, .. }
            | PipelineEvent::Updated { id, .. } => *id,
        }
    }
}

/// Cloneable publisher handle
#[derive(Debug)]
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
    taps: Arc<Mutex<Vec<mpsc::UnboundedSender<E>>>>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            taps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Publish to every current subscriber and tap; returns how many received it
    pub fn publish(&self, event: E) -> usize {
        let mut delivered = 0;
        {
            let mut taps = self.taps.lock();
            taps.retain(|tap| match tap.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            });
        }
        // Sending with no subscribers is not an error for a bus
        delivered + self.tx.send(event).unwrap_or(0)
    }

    /// Lossy subscription; a receiver that falls behind sees `Lagged`
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    /// Lossless subscription receiving every event in publish order.
    /// Closes once every handle of this bus is dropped.
    pub fn tap(&self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.taps.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count() + self.taps.lock().len()
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            taps: Arc::clone(&self.taps),
        }
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
