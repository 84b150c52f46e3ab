//! Shared state for the comms subsystem. This is the capability boundary
//! for channels.
//!
//! Channels receive an `Arc<CommsState>` and reach the relay only through
//! [`CommsState::handle`]. Utility commands (`ping`, `help`, usage) are
//! answered here; everything addressed to the model goes to
//! [`Relay::dispatch`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::relay::command::{self, Command};
use crate::relay::{ConversationKey, Outcome, Relay, ReplySink, Trigger};

// ── Events ────────────────────────────────────────────────────────────────────

/// Events a channel sends back to the comms subsystem manager.
#[derive(Debug)]
pub enum CommsEvent {
    /// Channel connected and is receiving messages.
    ChannelReady { channel_id: String },
    /// Channel has stopped (clean exit or EOF).
    ChannelShutdown { channel_id: String },
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// A platform message, before classification.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub sender: String,
    pub conversation: ConversationKey,
    pub text: String,
    /// How the bot is mentioned on this platform (`<@id>`, `@name`).
    pub mention_token: String,
    /// One-to-one conversation (console, private chat): plain text is an ask.
    pub direct: bool,
}

/// What the comms layer did with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// A utility command answered without the model.
    Utility,
    /// Passed through the relay.
    Relayed(Outcome),
}

// ── State ─────────────────────────────────────────────────────────────────────

pub struct CommsState {
    relay: Arc<Relay>,
    event_tx: mpsc::Sender<CommsEvent>,
}

impl CommsState {
    pub fn new(relay: Arc<Relay>, event_tx: mpsc::Sender<CommsEvent>) -> Self {
        Self { relay, event_tx }
    }

    pub fn command_prefix(&self) -> &str {
        self.relay.command_prefix()
    }

    /// Classify `inbound`, answer utility commands, and relay the rest.
    pub async fn handle<S: ReplySink>(&self, inbound: Inbound, sink: &S) -> Handled {
        let prefix = self.relay.command_prefix();
        let parsed = match command::parse(&inbound.text, prefix, &inbound.mention_token) {
            None if inbound.direct && !inbound.text.trim().is_empty() => {
                Some(Command::Ask(inbound.text.trim().to_string()))
            }
            other => other,
        };

        let mut trigger = Trigger {
            sender: inbound.sender,
            text: inbound.text,
            conversation: inbound.conversation,
            addressed: false,
            bot_token: inbound.mention_token,
        };

        let utility = match parsed {
            None => return Handled::Relayed(self.relay.dispatch(&trigger, sink).await),
            Some(Command::Ask(text)) => {
                trigger.text = text;
                trigger.addressed = true;
                return Handled::Relayed(self.relay.dispatch(&trigger, sink).await);
            }
            Some(Command::Ping) => "Pong!".to_string(),
            Some(Command::Help) => command::help_text(prefix),
            Some(Command::AskUsage) => command::ask_usage(prefix),
        };

        debug!(conversation = %trigger.conversation, "utility command");
        if let Err(e) = sink.reply(&trigger, utility).await {
            warn!(conversation = %trigger.conversation, error = %e, "reply delivery failed");
        }
        Handled::Utility
    }

    /// Report an event to the comms subsystem manager.
    ///
    /// Non-blocking: drops the event and logs a warning if the manager is not
    /// keeping up or has already exited.
    pub fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("comms event dropped: {e}");
        }
    }
}
