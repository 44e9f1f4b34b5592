//! Typed events decoded from the remote streams

use std::fmt;

use serde::{Deserialize, Serialize};

/// One decoded chat completion frame: `{ content?, done? }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
}

impl ChatEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            content: None,
            done: true,
        }
    }

    /// Frames with neither content nor a done flag carry nothing to apply
    pub fn is_empty(&self) -> bool {
        !self.done && self.content.as_deref().map_or(true, str::is_empty)
    }
}

/// Build lifecycle reported by the build socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Starting,
    Building,
    Completed,
    Failed,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStatus::Completed | BuildStatus::Failed)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BuildStatus::Starting => "starting",
            BuildStatus::Building => "building",
            BuildStatus::Completed => "completed",
            BuildStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One build socket frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuildEvent {
    Log {
        text: String,
    },
    Status {
        status: BuildStatus,
    },
    /// The backend accepted the build; emitted locally from the build-start response
    #[serde(skip)]
    Assigned {
        build_id: String,
    },
}
