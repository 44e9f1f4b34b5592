//! Live preview bridge
//!
//! Edits are coalesced on the editor side, cross the channel as serialized
//! messages, and are materialized by the router onto an injected surface.

pub mod coalescer;
pub mod document;
pub mod message;
pub mod router;
pub mod surface;

pub use coalescer::{Scheduled, UpdateCoalescer};
pub use message::{preview_channel, BridgeInbox, BridgeMessage, BridgePort};
pub use router::{MessageRouter, RouteOutcome};
pub use surface::{FileSurface, MemorySurface, RenderSurface};
