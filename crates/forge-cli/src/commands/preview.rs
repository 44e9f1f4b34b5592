//! `forge preview` - live preview of stdin edits
//!
//! Each stdin line is appended to the edit buffer and the full buffer is
//! scheduled for rendering. The router runs in its own task and only sees
//! serialized messages.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use forge_core::preview::{preview_channel, BridgeMessage, FileSurface, MessageRouter};
use forge_core::{ForgeConfig, UpdateCoalescer};

/// What one input line does to the preview
#[derive(Debug, PartialEq, Eq)]
enum Edit<'a> {
    /// Drop the buffer and show the placeholder
    Clear,
    /// Inject a stylesheet into the current document
    Style(&'a str),
    /// Append a line of source
    Append(&'a str),
}

fn parse_edit(line: &str) -> Edit<'_> {
    if line.trim() == "/clear" {
        return Edit::Clear;
    }
    match line.strip_prefix("/style ") {
        Some(css) => Edit::Style(css.trim()),
        None => Edit::Append(line),
    }
}

pub async fn run(config: &ForgeConfig, out: PathBuf, language: Option<String>) -> Result<()> {
    let (port, inbox) = preview_channel();
    let router = MessageRouter::new(FileSurface::new(&out));
    let renderer = tokio::spawn(router.run(inbox));

    let mut coalescer = UpdateCoalescer::new(port.clone(), config.debounce_window());
    port.post(&BridgeMessage::ClearPreview);

    let mut buffer = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!(
        "Previewing into {} (/clear resets, /style <css> injects styles)",
        out.display()
    );

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_edit(&line) {
                    Edit::Clear => {
                        buffer.clear();
                        coalescer.schedule(BridgeMessage::ClearPreview);
                    }
                    Edit::Style(css) => {
                        // A pending render must land before styles are injected into it
                        coalescer.flush();
                        port.post(&BridgeMessage::UpdateStyles {
                            payload: css.to_string(),
                        });
                    }
                    Edit::Append(text) => {
                        buffer.push_str(text);
                        buffer.push('\n');
                        coalescer.schedule(BridgeMessage::render(buffer.clone(), language.as_deref()));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    coalescer.flush();
    drop(coalescer);
    drop(port);

    let surface = renderer.await.context("Preview renderer stopped unexpectedly")?;
    eprintln!(
        "Preview written to {} ({} updates)",
        surface.path().display(),
        surface.writes()
    );
    Ok(())
}
