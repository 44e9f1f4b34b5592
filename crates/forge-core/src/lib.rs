//! Forge Core - Incremental remote-operation pipeline
//!
//! This crate provides the core functionality for the Forge CLI:
//! - Streamed chat completions decoded from SSE
//! - Build log sessions followed over a socket
//! - Cancellable, generation-guarded sessions with append-only artifacts
//! - Debounced live preview bridge with a validating message router

pub mod bus;
pub mod config;
pub mod constants;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod preview;
pub mod stream;
pub mod transport;

// Re-exports for convenience
pub use bus::{EventBus, PipelineEvent};
pub use config::{ForgeConfig, TimeoutPolicy};
pub use error::{ErrorKind, PipelineError, RenderError};
pub use pipeline::{
    ArtifactUpdate, BuildLog, ChatTranscript, SessionId, SessionIds, SessionKind, SessionSlot,
    SessionState,
};
pub use preview::{MessageRouter, UpdateCoalescer};
pub use transport::{BackendClient, BuildTransport, ChatTransport};
