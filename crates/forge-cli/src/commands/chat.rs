//! `forge chat` - line-oriented chat REPL
//!
//! Every non-command line starts a new turn, superseding a reply still in
//! flight. `/stop` or Ctrl-C stops the current reply; Ctrl-C with nothing in
//! flight exits. Only completed replies become conversation history.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use forge_core::transport::{ChatMessage, ChatRequest};
use forge_core::{
    BackendClient, ChatTransport, EventBus, ForgeConfig, SessionId, SessionIds, SessionSlot,
    SessionState,
};

use super::print_events;

/// A user line whose reply is still being produced
struct Turn {
    id: SessionId,
    prompt: String,
}

/// What one input line asks for
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Prompt(&'a str),
    Stop,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/stop" => Input::Stop,
        "/quit" | "/exit" => Input::Quit,
        prompt => Input::Prompt(prompt),
    }
}

pub async fn run(config: &ForgeConfig, model: String) -> Result<()> {
    let transport = ChatTransport::new(BackendClient::new(config)?, config.timeout_policy());
    let bus = EventBus::new();
    let printer = tokio::spawn(print_events(bus.tap()));
    let (mut slot, mut inbox) = SessionSlot::new(transport, SessionIds::new(), bus.clone());

    let mut history: Vec<ChatMessage> = Vec::new();
    let mut turn: Option<Turn> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut input_ended = false;

    eprintln!("Chatting with {} (/stop to interrupt, /quit to leave)", model);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    input_ended = true;
                    break;
                };
                match parse_input(&line) {
                    Input::Empty => {}
                    Input::Stop => {
                        slot.cancel();
                    }
                    Input::Quit => break,
                    Input::Prompt(prompt) => {
                        let mut messages = history.clone();
                        messages.push(ChatMessage::user(prompt));
                        let id = slot.start(ChatRequest {
                            model: model.clone(),
                            messages,
                        });
                        turn = Some(Turn {
                            id,
                            prompt: prompt.to_string(),
                        });
                    }
                }
            }
            Some(envelope) = inbox.recv() => {
                slot.apply(envelope);
            }
            _ = tokio::signal::ctrl_c() => {
                if !slot.cancel() {
                    break;
                }
            }
        }
        record_turn(&slot, &mut turn, &mut history);
    }

    if input_ended {
        // Piped input: let the last reply finish before leaving
        slot.run_until_settled(&mut inbox).await;
        record_turn(&slot, &mut turn, &mut history);
    }
    slot.cancel();
    drop(slot);
    drop(bus);
    let _ = printer.await;
    tracing::info!("Chat ended with {} messages of history", history.len());
    Ok(())
}

/// Move a finished turn into history when its reply completed
fn record_turn(
    slot: &SessionSlot<ChatTransport>,
    turn: &mut Option<Turn>,
    history: &mut Vec<ChatMessage>,
) {
    let Some(current) = turn.as_ref() else {
        return;
    };
    let Some(controller) = slot.active().filter(|c| c.id() == current.id) else {
        // Superseded before it finished
        *turn = None;
        return;
    };
    if !controller.is_terminal() {
        return;
    }
    if controller.state() == SessionState::Completed {
        history.push(ChatMessage::user(current.prompt.clone()));
        history.push(ChatMessage::assistant(controller.artifact().text()));
    }
    *turn = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  hello there "), Input::Prompt("hello there"));
        assert_eq!(parse_input("/stop"), Input::Stop);
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input("   "), Input::Empty);
    }
}
