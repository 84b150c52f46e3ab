//! Dispatch orchestrator.
//!
//! Channels turn platform messages into [`Trigger`]s and hand them to
//! [`Relay::dispatch`] together with a [`ReplySink`] for the conversation.
//! Each addressed trigger flows through
//!
//! ```text
//! Received → Gated → (Rejected | Building → Calling → Replying) → Done
//! ```
//!
//! and produces exactly one reply. Everything that can go wrong after the
//! gate is folded into that reply; `dispatch` itself never fails.

pub mod clock;
pub mod command;
pub mod cooldown;
pub mod prompt;
pub mod reply;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Config, RelayConfig};
use crate::error::AppError;
use crate::llm::{InferenceClient, InferenceResult, ProviderError};

use clock::{Clock, SystemClock};
use cooldown::CooldownGate;
use prompt::PromptBuilder;

/// Reply text used when the model answers with nothing printable.
pub const EMPTY_RESPONSE: &str = "(empty response)";

// ── Trigger ───────────────────────────────────────────────────────────────────

/// Identity of a conversation (channel, chat, console session).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationKey {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConversationKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One inbound chat message as seen by the relay.
#[derive(Debug, Clone)]
pub struct Trigger {
    /// Platform identity of the author.
    pub sender: String,
    /// Message text exactly as received.
    pub text: String,
    pub conversation: ConversationKey,
    /// Whether the message is a command or mention aimed at the bot.
    pub addressed: bool,
    /// How the bot is mentioned on this platform; stripped from the prompt.
    pub bot_token: String,
}

// ── Reply sink ────────────────────────────────────────────────────────────────

/// Delivery side of a channel.
pub trait ReplySink: Send + Sync {
    /// Post `text` into the trigger's conversation.
    fn reply(&self, trigger: &Trigger, text: String) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Show a "working on it" indicator. Best effort; the default does nothing.
    fn show_typing(&self, _conversation: &ConversationKey) -> impl Future<Output = Result<(), AppError>> + Send {
        async { Ok(()) }
    }
}

/// What [`Relay::dispatch`] did with a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not addressed to the bot; nothing sent.
    Ignored,
    /// A cooldown gate rejected it; the deflection message was sent.
    Deflected,
    /// The model answered; `truncated` tells whether the ceiling cut it.
    Answered { truncated: bool },
    /// The call failed; an error reply was sent.
    Failed,
}

// ── Relay ─────────────────────────────────────────────────────────────────────

pub struct Relay {
    gate: CooldownGate,
    sender_gate: Option<CooldownGate<String>>,
    prompts: PromptBuilder,
    client: InferenceClient,
    clock: Arc<dyn Clock>,
    command_prefix: String,
    reply_ceiling: usize,
    truncation_marker: String,
    cooldown_message: String,
    user_cooldown_message: String,
}

impl Relay {
    pub fn new(config: &RelayConfig, prompts: PromptBuilder, client: InferenceClient) -> Self {
        Self {
            gate: CooldownGate::new(config.cooldown, config.cooldown_capacity),
            sender_gate: config
                .user_cooldown
                .map(|window| CooldownGate::new(window, config.cooldown_capacity)),
            prompts,
            client,
            clock: Arc::new(SystemClock),
            command_prefix: config.command_prefix.clone(),
            reply_ceiling: config.reply_ceiling,
            truncation_marker: config.truncation_marker.clone(),
            cooldown_message: config.cooldown_message.clone(),
            user_cooldown_message: config.user_cooldown_message.clone(),
        }
    }

    /// Wire a relay from the resolved configuration: persona, provider, gates.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let client = InferenceClient::from_config(&config.llm, config.llm_api_key.clone())?;
        let prompts = PromptBuilder::from_config(&config.relay);
        info!(
            provider = %config.llm.provider,
            model = client.model(),
            cooldown_secs = config.relay.cooldown.as_secs_f64(),
            "relay ready"
        );
        Ok(Self::new(&config.relay, prompts, client))
    }

    /// Replace the time source used by the gates.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    /// Run one trigger to completion and report what happened.
    pub async fn dispatch<S: ReplySink>(&self, trigger: &Trigger, sink: &S) -> Outcome {
        if !trigger.addressed {
            return Outcome::Ignored;
        }

        let now = self.clock.now();

        // Sender first: a sender rejection must not consume the conversation's window.
        if let Some(sender_gate) = &self.sender_gate {
            if !sender_gate.admit(&trigger.sender, now) {
                debug!(sender = %trigger.sender, conversation = %trigger.conversation, "sender on cooldown");
                self.send(trigger, sink, self.user_cooldown_message.clone()).await;
                return Outcome::Deflected;
            }
        }

        if !self.gate.admit(&trigger.conversation, now) {
            debug!(conversation = %trigger.conversation, "conversation on cooldown");
            self.send(trigger, sink, self.cooldown_message.clone()).await;
            return Outcome::Deflected;
        }

        let prompt = self.prompts.build(&trigger.text, &trigger.bot_token);
        debug!(conversation = %trigger.conversation, prompt_len = prompt.as_str().len(), "prompt built");

        if let Err(e) = sink.show_typing(&trigger.conversation).await {
            debug!(conversation = %trigger.conversation, error = %e, "typing indicator failed");
        }

        let (text, outcome) = match self.client.generate(prompt.as_str()).await {
            InferenceResult::Text(text) => {
                let text = if text.trim().is_empty() { EMPTY_RESPONSE.to_string() } else { text };
                let shaped = reply::truncate(&text, self.reply_ceiling, &self.truncation_marker);
                (shaped.text, Outcome::Answered { truncated: shaped.truncated })
            }
            InferenceResult::Failure(reason) => {
                warn!(conversation = %trigger.conversation, %reason, "inference failed; replying with error");
                let shaped = reply::truncate(
                    &format!("Error: {reason}"),
                    self.reply_ceiling,
                    &self.truncation_marker,
                );
                (shaped.text, Outcome::Failed)
            }
        };

        self.send(trigger, sink, text).await;
        outcome
    }

    async fn send<S: ReplySink>(&self, trigger: &Trigger, sink: &S, text: String) {
        if let Err(e) = sink.reply(trigger, text).await {
            warn!(conversation = %trigger.conversation, error = %e, "reply delivery failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Sink that records every reply instead of delivering it.
    #[derive(Default)]
    pub struct RecordingSink {
        pub replies: Mutex<Vec<(ConversationKey, String)>>,
        pub typing: AtomicUsize,
        pub fail_delivery: bool,
    }

    impl RecordingSink {
        pub fn texts(&self) -> Vec<String> {
            self.replies.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }

        pub fn typing_count(&self) -> usize {
            self.typing.load(Ordering::SeqCst)
        }
    }

    impl ReplySink for RecordingSink {
        async fn reply(&self, trigger: &Trigger, text: String) -> Result<(), AppError> {
            self.replies.lock().unwrap().push((trigger.conversation.clone(), text));
            if self.fail_delivery {
                return Err(AppError::Comms("socket closed".into()));
            }
            Ok(())
        }

        async fn show_typing(&self, _conversation: &ConversationKey) -> Result<(), AppError> {
            self.typing.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub fn trigger(sender: &str, conversation: &str, text: &str) -> Trigger {
        Trigger {
            sender: sender.to_string(),
            text: text.to_string(),
            conversation: conversation.into(),
            addressed: true,
            bot_token: "<@42>".to_string(),
        }
    }
}
