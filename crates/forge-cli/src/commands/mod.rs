//! Subcommand implementations

pub mod build;
pub mod chat;
pub mod files;
pub mod preview;

use std::io::Write;

use forge_core::pipeline::ArtifactUpdate;
use forge_core::PipelineEvent;
use tokio::sync::mpsc::UnboundedReceiver;

/// Print artifact updates as they are published, until the bus closes.
/// Takes a bus tap: every delta is printed, in order, however slow stdout is.
pub async fn print_events(events: UnboundedReceiver<PipelineEvent>) {
    write_events(events, std::io::stdout()).await;
}

async fn write_events<W: Write>(mut events: UnboundedReceiver<PipelineEvent>, mut out: W) {
    while let Some(event) = events.recv().await {
        if let Some(text) = render_event(&event) {
            if let Err(e) = write!(out, "{}", text).and_then(|()| out.flush()) {
                tracing::warn!("Could not write output: {}", e);
            }
        }
    }
}

/// Terminal text for one event, if it produces any
fn render_event(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::Updated { update, .. } => Some(match update {
            ArtifactUpdate::Text(text) => text.clone(),
            ArtifactUpdate::Notice(notice) => notice.clone(),
            ArtifactUpdate::Line(line) => format!("{}\n", line),
            ArtifactUpdate::Status(status) => format!("[build {}]\n", status),
            ArtifactUpdate::BuildAssigned(id) => format!("[build id {}]\n", id),
        }),
        PipelineEvent::StateChanged { state, .. } if state.is_terminal() => Some("\n".to_string()),
        PipelineEvent::StateChanged { .. } | PipelineEvent::SessionStarted { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::pipeline::Accumulator;
    use forge_core::stream::{BuildStatus, ChatEvent};
    use forge_core::{ChatTranscript, EventBus, SessionIds, SessionKind, SessionState};

    #[test]
    fn test_render_event() {
        let id = SessionIds::new().next_id();
        let text = PipelineEvent::Updated {
            id,
            update: ArtifactUpdate::Text("Hel".into()),
        };
        assert_eq!(render_event(&text).as_deref(), Some("Hel"));

        let status = PipelineEvent::Updated {
            id,
            update: ArtifactUpdate::Status(BuildStatus::Building),
        };
        assert_eq!(render_event(&status).as_deref(), Some("[build building]\n"));

        let started = PipelineEvent::SessionStarted {
            id,
            kind: SessionKind::Chat,
        };
        assert!(render_event(&started).is_none());

        let done = PipelineEvent::StateChanged {
            id,
            state: SessionState::Completed,
        };
        assert_eq!(render_event(&done).as_deref(), Some("\n"));
    }

    #[tokio::test]
    async fn test_printed_text_matches_transcript_past_bus_capacity() {
        let bus = EventBus::with_capacity(16);
        let events = bus.tap();
        let id = SessionIds::new().next_id();

        let mut transcript = ChatTranscript::default();
        for i in 0..300 {
            let applied = transcript.apply(ChatEvent::content(format!("t{} ", i)));
            for update in applied.updates {
                bus.publish(PipelineEvent::Updated { id, update });
            }
        }
        drop(bus);

        let mut printed = Vec::new();
        write_events(events, &mut printed).await;
        assert_eq!(String::from_utf8(printed).unwrap(), transcript.text());
    }
}
