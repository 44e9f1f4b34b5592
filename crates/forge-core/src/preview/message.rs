//! Preview bridge messages
//!
//! The preview surface runs in its own context and shares no memory with the
//! editor side. Everything that crosses over is a serialized, type-tagged
//! message; the receiving side validates it before acting.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// One message understood by the preview surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    /// Replace the whole document with `payload` rendered as `language`
    #[serde(rename = "RENDER_CODE")]
    RenderCode {
        payload: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// Reset to the placeholder document
    #[serde(rename = "CLEAR_PREVIEW")]
    ClearPreview,
    /// Inject an extra stylesheet into the current document
    #[serde(rename = "UPDATE_STYLES")]
    UpdateStyles { payload: String },
}

impl BridgeMessage {
    pub fn render(payload: impl Into<String>, language: Option<&str>) -> Self {
        BridgeMessage::RenderCode {
            payload: payload.into(),
            language: language.map(str::to_string),
        }
    }

    /// Wire name of the message type
    pub fn type_name(&self) -> &'static str {
        match self {
            BridgeMessage::RenderCode { .. } => "RENDER_CODE",
            BridgeMessage::ClearPreview => "CLEAR_PREVIEW",
            BridgeMessage::UpdateStyles { .. } => "UPDATE_STYLES",
        }
    }
}

/// Sending side of the preview channel
///
/// The channel carries raw text because other senders share it; nothing on
/// the receiving side may assume a message is well formed.
#[derive(Debug, Clone)]
pub struct BridgePort {
    tx: mpsc::UnboundedSender<String>,
}

/// Receiving side of the preview channel
pub type BridgeInbox = mpsc::UnboundedReceiver<String>;

impl BridgePort {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Serialize and post a message. Returns false once the surface is gone.
    pub fn post(&self, message: &BridgeMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => self.post_raw(json),
            Err(e) => {
                warn!("Failed to serialize {} message: {}", message.type_name(), e);
                false
            }
        }
    }

    /// Post arbitrary text onto the shared channel
    pub fn post_raw(&self, text: impl Into<String>) -> bool {
        self.tx.send(text.into()).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a preview channel
///
/// Returns (port, inbox):
/// - port: cloneable sender used by the editor side
/// - inbox: consumed by the `MessageRouter`
pub fn preview_channel() -> (BridgePort, BridgeInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BridgePort::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_string(&BridgeMessage::render("<p>x</p>", Some("html"))).unwrap();
        assert_eq!(
            json,
            r#"{"type":"RENDER_CODE","payload":"<p>x</p>","language":"html"}"#
        );
        assert_eq!(
            serde_json::to_string(&BridgeMessage::ClearPreview).unwrap(),
            r#"{"type":"CLEAR_PREVIEW"}"#
        );
    }

    #[test]
    fn test_language_is_optional() {
        let message: BridgeMessage =
            serde_json::from_str(r#"{"type":"RENDER_CODE","payload":"plain"}"#).unwrap();
        assert_eq!(message, BridgeMessage::render("plain", None));
    }

    #[test]
    fn test_unknown_or_incomplete_messages_rejected() {
        assert!(serde_json::from_str::<BridgeMessage>(r#"{"type":"EXECUTE"}"#).is_err());
        assert!(serde_json::from_str::<BridgeMessage>(r#"{"type":"UPDATE_STYLES"}"#).is_err());
        assert!(serde_json::from_str::<BridgeMessage>(r#"{"payload":"x"}"#).is_err());
    }

    #[tokio::test]
    async fn test_channel_roundtrip() {
        let (port, mut inbox) = preview_channel();
        assert!(port.post(&BridgeMessage::UpdateStyles {
            payload: "body{}".into()
        }));
        assert!(port.post_raw("hello from elsewhere"));

        let first = inbox.recv().await.unwrap();
        assert!(first.contains("UPDATE_STYLES"));
        assert_eq!(inbox.recv().await.unwrap(), "hello from elsewhere");

        drop(inbox);
        assert!(!port.post(&BridgeMessage::ClearPreview));
        assert!(port.is_closed());
    }
}
