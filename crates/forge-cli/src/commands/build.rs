//! `forge build` - start a build and follow its log

use anyhow::{bail, Result};

use forge_core::transport::BuildRequest;
use forge_core::{
    BackendClient, BuildTransport, EventBus, ForgeConfig, SessionIds, SessionSlot, SessionState,
};

use super::print_events;

pub async fn run(config: &ForgeConfig, project: String) -> Result<()> {
    let transport = BuildTransport::new(BackendClient::new(config)?);
    let bus = EventBus::new();
    let printer = tokio::spawn(print_events(bus.tap()));
    let (mut slot, mut inbox) = SessionSlot::new(transport, SessionIds::new(), bus.clone());

    eprintln!("Building {} (Ctrl-C to stop)", project);
    slot.start(BuildRequest::new(project));

    while !slot.is_settled() {
        tokio::select! {
            envelope = inbox.recv() => match envelope {
                Some(envelope) => {
                    slot.apply(envelope);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                slot.cancel();
            }
        }
    }

    let (state, download, failure) = match slot.active() {
        Some(controller) => (
            controller.state(),
            slot.transport().client().download_url(controller.artifact()),
            controller.session().error_detail.clone(),
        ),
        None => bail!("no build was started"),
    };

    drop(slot);
    drop(bus);
    let _ = printer.await;

    match state {
        SessionState::Completed => {
            if let Some(url) = download {
                println!("Artifact: {}", url);
            }
            Ok(())
        }
        SessionState::Cancelled => {
            eprintln!("Build stopped");
            Ok(())
        }
        _ => match failure {
            Some(detail) => bail!("Build failed ({}): {}", detail.kind, detail.message),
            None => bail!("Build ended {}", state),
        },
    }
}
