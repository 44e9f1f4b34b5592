//! Stream decoders
//!
//! - `sse`: buffered decoding of `data: <json>` chat completion frames
//! - `frames`: per-frame decoding of build socket messages

pub mod events;
pub mod frames;
pub mod sse;

pub use events::{BuildEvent, BuildStatus, ChatEvent};
pub use frames::FrameDecoder;
pub use sse::SseDecoder;
