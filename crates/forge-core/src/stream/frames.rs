//! Build socket frame decoding
//!
//! Socket frames are message-aligned, so each one is decoded on its own with
//! no buffering. Frames that do not match a known shape are dropped.

use tracing::{debug, warn};

use super::events::BuildEvent;
use crate::error::PipelineError;

/// Stateless-per-frame decoder for build events
#[derive(Debug, Default)]
pub struct FrameDecoder {
    decoded: usize,
    discarded: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one text frame, dropping it if malformed
    pub fn decode(&mut self, frame: &str) -> Option<BuildEvent> {
        match Self::decode_strict(frame) {
            Ok(event) => {
                self.decoded += 1;
                debug!("Build frame #{}: {:?}", self.decoded, event);
                Some(event)
            }
            Err(e) => {
                self.discarded += 1;
                warn!("Discarding build frame ({} so far): {}", self.discarded, e);
                None
            }
        }
    }

    /// Decode one binary frame; the payload must still be UTF-8 JSON
    pub fn decode_binary(&mut self, frame: &[u8]) -> Option<BuildEvent> {
        match std::str::from_utf8(frame) {
            Ok(text) => self.decode(text),
            Err(e) => {
                self.discarded += 1;
                warn!("Discarding non-UTF-8 build frame: {}", e);
                None
            }
        }
    }

    /// Decode a frame, reporting why it was rejected
    pub fn decode_strict(frame: &str) -> Result<BuildEvent, PipelineError> {
        Ok(serde_json::from_str(frame.trim())?)
    }

    pub fn decoded(&self) -> usize {
        self.decoded
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }
}
