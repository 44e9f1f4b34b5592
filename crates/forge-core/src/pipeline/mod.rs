//! Session pipeline
//!
//! - `session`: identity and lifecycle state of one remote operation
//! - `cancellation`: token plus abort handle bound to one transport task
//! - `accumulator`: append-only reduction of events into an artifact
//! - `controller`: the per-session state machine
//! - `slot`: single active session with the generation guard

pub mod accumulator;
pub mod cancellation;
pub mod controller;
pub mod session;
pub mod slot;

pub use accumulator::{Accumulator, Applied, ArtifactUpdate, BuildLog, ChatTranscript, Outcome};
pub use cancellation::CancellationGate;
pub use controller::{SessionController, Step};
pub use session::{ErrorDetail, Session, SessionId, SessionIds, SessionKind, SessionState};
pub use slot::{
    Delivery, Envelope, EventSink, Inbox, SessionSlot, Signal, Transport, TransportEvent,
};
