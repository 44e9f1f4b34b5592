//! Artifact accumulators
//!
//! Append-only reductions of a session's event stream into what the UI shows.
//! Events are applied in arrival order and never reordered, merged, or
//! deduplicated by content; at any point the artifact is a prefix extension of
//! every earlier value.

use crate::constants::pipeline::STOPPED_BY_USER;
use crate::error::PipelineError;
use crate::stream::{BuildEvent, BuildStatus, ChatEvent};

/// A change to an artifact, as published to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactUpdate {
    /// Text appended to a chat transcript
    Text(String),
    /// Line appended to a build log
    Line(String),
    /// Build status replaced
    Status(BuildStatus),
    /// Build id assigned by the backend
    BuildAssigned(String),
    /// Informational marker appended on a terminal transition
    Notice(String),
}

/// How an event stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed(PipelineError),
}

/// Result of applying one event
#[derive(Debug, Default)]
pub struct Applied {
    pub updates: Vec<ArtifactUpdate>,
    /// Set when the event was a terminal signal
    pub outcome: Option<Outcome>,
}

/// Reduces a session's events into its artifact
pub trait Accumulator: Default + Send + 'static {
    type Event: Send + std::fmt::Debug + 'static;

    /// Append one event
    fn apply(&mut self, event: Self::Event) -> Applied;

    /// Whether the event came off the wire. Locally produced events are
    /// recorded without moving a starting session to streaming.
    fn opens_stream(_event: &Self::Event) -> bool {
        true
    }

    /// Append an informational marker (stop, error) so a partial artifact stays explainable
    fn record_notice(&mut self, notice: &str) -> ArtifactUpdate;

    /// Outcome when the transport closes without a terminal signal
    fn outcome_on_close(&self) -> Outcome;

    /// Marker recorded when the user stops the session
    fn stopped_marker(&self) -> &'static str {
        STOPPED_BY_USER
    }
}

/// Chat artifact: one growing string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatTranscript {
    text: String,
}

impl ChatTranscript {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Accumulator for ChatTranscript {
    type Event = ChatEvent;

    fn apply(&mut self, event: ChatEvent) -> Applied {
        let mut applied = Applied::default();
        if let Some(content) = event.content.filter(|c| !c.is_empty()) {
            self.text.push_str(&content);
            applied.updates.push(ArtifactUpdate::Text(content));
        }
        if event.done {
            applied.outcome = Some(Outcome::Completed);
        }
        applied
    }

    fn record_notice(&mut self, notice: &str) -> ArtifactUpdate {
        let appended = if self.text.is_empty() {
            notice.to_string()
        } else {
            format!("\n\n{}", notice)
        };
        self.text.push_str(&appended);
        ArtifactUpdate::Notice(appended)
    }

    fn outcome_on_close(&self) -> Outcome {
        Outcome::Completed
    }
}

/// Build artifact: ordered log lines plus the latest status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildLog {
    build_id: Option<String>,
    lines: Vec<String>,
    status: Option<BuildStatus>,
}

impl BuildLog {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn status(&self) -> Option<BuildStatus> {
        self.status
    }

    pub fn build_id(&self) -> Option<&str> {
        self.build_id.as_deref()
    }

    /// Artifact download is offered only once the build completed
    pub fn can_download(&self) -> bool {
        self.status == Some(BuildStatus::Completed) && self.build_id.is_some()
    }
}

impl Accumulator for BuildLog {
    type Event = BuildEvent;

    fn apply(&mut self, event: BuildEvent) -> Applied {
        let mut applied = Applied::default();
        match event {
            BuildEvent::Log { text } => {
                self.lines.push(text.clone());
                applied.updates.push(ArtifactUpdate::Line(text));
            }
            BuildEvent::Status { status } => {
                self.status = Some(status);
                applied.updates.push(ArtifactUpdate::Status(status));
                applied.outcome = match status {
                    BuildStatus::Completed => Some(Outcome::Completed),
                    BuildStatus::Failed => Some(Outcome::Failed(build_failed())),
                    BuildStatus::Starting | BuildStatus::Building => None,
                };
            }
            BuildEvent::Assigned { build_id } => {
                self.build_id = Some(build_id.clone());
                applied.updates.push(ArtifactUpdate::BuildAssigned(build_id));
            }
        }
        applied
    }

    fn opens_stream(event: &BuildEvent) -> bool {
        !matches!(event, BuildEvent::Assigned { .. })
    }

    fn record_notice(&mut self, notice: &str) -> ArtifactUpdate {
        self.lines.push(notice.to_string());
        ArtifactUpdate::Notice(notice.to_string())
    }

    fn outcome_on_close(&self) -> Outcome {
        match self.status {
            Some(BuildStatus::Completed) => Outcome::Completed,
            Some(BuildStatus::Failed) => Outcome::Failed(build_failed()),
            _ => Outcome::Failed(PipelineError::Transport(
                "connection closed before the build finished".to_string(),
            )),
        }
    }
}

fn build_failed() -> PipelineError {
    PipelineError::Remote("build failed".to_string())
}
