//! Telegram comms channel: long-polls the Bot API and relays messages.
//!
//! Private chats are direct conversations; in groups the bot answers
//! commands and `@username` mentions only.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::state::{CommsEvent, CommsState, Inbound};
use crate::error::AppError;
use crate::relay::{ConversationKey, ReplySink, Trigger};
use crate::subsystems::runtime::{Component, ComponentFuture};

// ── TelegramChannel ──────────────────────────────────────────────────────────

pub struct TelegramChannel {
    channel_id: String,
    token: String,
    state: Arc<CommsState>,
}

impl TelegramChannel {
    pub fn new(channel_id: impl Into<String>, token: String, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), token, state }
    }
}

impl Component for TelegramChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_telegram(self.channel_id, self.token, self.state, shutdown))
    }
}

// ── Sink ─────────────────────────────────────────────────────────────────────

struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
}

impl ReplySink for TelegramSink {
    async fn reply(&self, _trigger: &Trigger, text: String) -> Result<(), AppError> {
        self.bot
            .send_message(self.chat_id, text)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Comms(format!("telegram send failed: {e}")))
    }

    async fn show_typing(&self, _conversation: &ConversationKey) -> Result<(), AppError> {
        self.bot
            .send_chat_action(self.chat_id, ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Comms(format!("telegram typing failed: {e}")))
    }
}

// ── run_telegram ─────────────────────────────────────────────────────────────

async fn run_telegram(
    channel_id: String,
    token: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let bot = Bot::new(token);
    let me = bot
        .get_me()
        .await
        .map_err(|e| AppError::Comms(format!("telegram getMe failed: {e}")))?;
    let mention_token = format!("@{}", me.username());

    info!(%channel_id, bot = %mention_token, "telegram channel starting");
    state.report_event(CommsEvent::ChannelReady { channel_id: channel_id.clone() });

    let in_flight = TaskTracker::new();
    let handler_state = state.clone();
    let handler_channel = channel_id.clone();
    let handler_tasks = in_flight.clone();
    let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let state = handler_state.clone();
        let channel_id = handler_channel.clone();
        let mention_token = mention_token.clone();
        let in_flight = handler_tasks.clone();
        async move {
            let Some(text) = msg.text() else {
                return respond(());
            };
            let Some(from) = msg.from.as_ref() else {
                return respond(());
            };
            if from.is_bot {
                return respond(());
            }

            debug!(%channel_id, chat = msg.chat.id.0, "telegram received message");

            let inbound = Inbound {
                sender: format!("telegram:{}", from.id.0),
                conversation: format!("telegram:{}", msg.chat.id.0).into(),
                text: text.to_string(),
                mention_token,
                direct: msg.chat.is_private(),
            };
            let sink = TelegramSink { bot, chat_id: msg.chat.id };

            // The dispatcher serializes updates per chat; hand off so the next
            // update from this chat reaches the cooldown gate immediately.
            in_flight.spawn(async move {
                state.handle(inbound, &sink).await;
            });
            respond(())
        }
    });

    let mut dispatcher = Dispatcher::builder(bot, handler).build();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!(%channel_id, "shutdown signal received, closing telegram channel");
        }
        _ = dispatcher.dispatch() => {
            warn!(%channel_id, "telegram dispatcher exited unexpectedly");
        }
    }

    in_flight.close();
    in_flight.wait().await;

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}
