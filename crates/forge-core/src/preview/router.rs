//! Preview message router
//!
//! Consumer side of the preview channel. The channel is shared with other
//! senders, so every message is validated before it is acted on and anything
//! unrecognized is logged and dropped. Render failures never escape: the
//! surface is left showing an error document instead.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::document::{error_document, inject_style, render_document};
use super::message::{BridgeInbox, BridgeMessage};
use super::surface::RenderSurface;
use crate::constants::preview::PLACEHOLDER_DOCUMENT;

const KNOWN_TYPES: &[&str] = &["RENDER_CODE", "CLEAR_PREVIEW", "UPDATE_STYLES"];

/// What the router did with one raw message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The document was replaced as requested
    Applied,
    /// Writing failed; the error document is shown instead
    Fallback,
    /// Not a valid preview message
    Ignored,
}

pub struct MessageRouter<S: RenderSurface> {
    surface: S,
    current: String,
    routed: usize,
    ignored: usize,
}

impl<S: RenderSurface> MessageRouter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            current: PLACEHOLDER_DOCUMENT.to_string(),
            routed: 0,
            ignored: 0,
        }
    }

    /// Validate and apply one raw message
    pub fn route(&mut self, raw: &str) -> RouteOutcome {
        match parse(raw) {
            Ok(message) => {
                self.routed += 1;
                self.dispatch(message)
            }
            Err(reason) => {
                self.ignored += 1;
                warn!("Ignoring preview message: {}", reason);
                RouteOutcome::Ignored
            }
        }
    }

    /// Apply an already validated message
    pub fn dispatch(&mut self, message: BridgeMessage) -> RouteOutcome {
        debug!("Routing {}", message.type_name());
        let document = match message {
            BridgeMessage::RenderCode { payload, language } => {
                render_document(&payload, language.as_deref())
            }
            BridgeMessage::ClearPreview => PLACEHOLDER_DOCUMENT.to_string(),
            BridgeMessage::UpdateStyles { payload } => inject_style(&self.current, &payload),
        };

        match self.surface.write_document(&document) {
            Ok(()) => {
                self.current = document;
                RouteOutcome::Applied
            }
            Err(err) => {
                error!("Preview render failed ({}): {}", err.kind(), err);
                let fallback = error_document(&err.to_string());
                match self.surface.write_document(&fallback) {
                    Ok(()) => self.current = fallback,
                    Err(e) => error!("Fallback document could not be written either: {}", e),
                }
                RouteOutcome::Fallback
            }
        }
    }

    /// Route messages until every sender is gone, then hand back the surface
    pub async fn run(mut self, mut inbox: BridgeInbox) -> S {
        info!("Preview router started");
        while let Some(raw) = inbox.recv().await {
            self.route(&raw);
        }
        info!(
            routed = self.routed,
            ignored = self.ignored,
            "Preview channel closed"
        );
        self.surface
    }

    /// Document the surface is showing
    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn ignored(&self) -> usize {
        self.ignored
    }
}

/// Check the discriminator before decoding the rest of the message
fn parse(raw: &str) -> Result<BridgeMessage, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("not JSON: {}", e))?;
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err("missing type".to_string());
    };
    if !KNOWN_TYPES.contains(&kind) {
        return Err(format!("unknown type '{}'", kind));
    }
    let kind = kind.to_string();
    serde_json::from_value(value).map_err(|e| format!("malformed {}: {}", kind, e))
}
