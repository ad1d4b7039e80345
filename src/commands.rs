//! Terminal chat on top of [`ServerlessPeer`]: copy the printed descriptor to
//! the other side, paste theirs with `/connect`, then type away.

use crate::config::SessionConfig;
use crate::peer::connection::WebRtcEngineFactory;
use crate::peer::message::MessageEnvelope;
use crate::peer::state::ConnectionState;
use crate::webrtc_peer::{PeerStatus, ServerlessPeer};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

pub const TEXT_MESSAGE: &str = "text-message";
pub const PING: &str = "ping";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect(String),
    Text(String),
    Ping,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Text(line.to_string());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "connect" if !arg.is_empty() => Command::Connect(arg.to_string()),
            "ping" => Command::Ping,
            "status" => Command::Status,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// Things the message handlers report back to the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Ping,
}

pub fn register_chat_handlers(peer: &ServerlessPeer, inbox: mpsc::UnboundedSender<Inbound>) {
    let tx = inbox.clone();
    peer.register_handler(TEXT_MESSAGE, move |text: String| {
        let _ = tx.send(Inbound::Text(text));
    });
    peer.register_handler(PING, move |()| {
        let _ = inbox.send(Inbound::Ping);
    });
}

fn print_help() {
    println!("commands:");
    println!("  /connect <descriptor>  apply the descriptor your friend sent");
    println!("  /ping                  send a ping");
    println!("  /status                show connection status and local descriptor");
    println!("  /quit                  leave");
    println!("  anything else          send as a text message");
}

fn stamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[derive(Default)]
struct StatusPrinter {
    last_state: Option<ConnectionState>,
    last_descriptor: Option<String>,
}

impl StatusPrinter {
    fn print(&mut self, status: &PeerStatus, force: bool) {
        if force || self.last_state != Some(status.connection_state) {
            println!("[{}] {}", status.connection_state, status.connection_state.prompt());
            self.last_state = Some(status.connection_state);
        }

        let wants_descriptor = matches!(
            status.connection_state,
            ConnectionState::Initial | ConnectionState::NeedToSendLocalDescriptor
        );
        if !wants_descriptor {
            return;
        }
        if status.is_loading {
            if force {
                println!("gathering candidates...");
            }
            return;
        }
        if let Some(desc) = &status.local_descriptor {
            if force || self.last_descriptor.as_ref() != Some(desc) {
                println!("---- local descriptor ----\n{desc}\n--------------------------");
                self.last_descriptor = Some(desc.clone());
            }
        }
    }
}

/// Run the interactive chat until `/quit` or end of input.
pub async fn run(config: SessionConfig) -> anyhow::Result<()> {
    let mut peer = ServerlessPeer::create(Arc::new(WebRtcEngineFactory), config).await?;
    let (inbox_tx, mut inbox) = mpsc::unbounded_channel();
    register_chat_handlers(&peer, inbox_tx);

    let mut status = peer.subscribe();
    let mut printer = StatusPrinter::default();
    printer.print(&peer.status(), true);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = peer.next_event() => peer.handle_event(event),
            Ok(()) = status.changed() => {
                let current = status.borrow_and_update().clone();
                printer.print(&current, false);
            }
            Some(inbound) = inbox.recv() => match inbound {
                Inbound::Text(text) => println!("{} << {text}", stamp()),
                Inbound::Ping => println!("{} << (ping)", stamp()),
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Command::Connect(blob) => {
                        if let Err(e) = peer.set_remote_descriptor(&blob).await {
                            println!("cannot connect: {e}");
                        }
                    }
                    Command::Text(text) => {
                        peer.send_message(&MessageEnvelope::new(TEXT_MESSAGE, text)).await;
                    }
                    Command::Ping => peer.send_message(&MessageEnvelope::<()>::bare(PING)).await,
                    Command::Status => printer.print(&peer.status(), true),
                    Command::Help => print_help(),
                    Command::Quit => break,
                    Command::Empty => {}
                    Command::Unknown(cmd) => println!("unknown command: {cmd} (try /help)"),
                }
            }
        }
    }

    info!("shutting down");
    peer.dispose().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("  "), Command::Empty);
        assert_eq!(Command::parse("hello there"), Command::Text("hello there".into()));
        assert_eq!(Command::parse("/ping"), Command::Ping);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(
            Command::parse("/connect  {\"type\":\"offer\",\"sdp\":\"v=0\"} "),
            Command::Connect("{\"type\":\"offer\",\"sdp\":\"v=0\"}".into())
        );
        assert_eq!(Command::parse("/connect"), Command::Unknown("/connect".into()));
        assert_eq!(Command::parse("/nope"), Command::Unknown("/nope".into()));
    }
}
