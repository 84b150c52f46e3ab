//! Discord channel: a serenity gateway client feeding the relay.
//!
//! Listens on guild and direct messages. Bot-authored messages are dropped.
//! In guilds the bot answers `!ask`, `!ping`, `!help` and mentions; in DMs
//! any text is an ask. Serenity runs every event handler on its own task,
//! so a slow inference call never stalls the gateway heartbeat. Those tasks
//! are tracked so shutdown waits for replies already in flight.

use std::sync::{Arc, OnceLock};

use serenity::all::{
    ChannelId, Client, Context, EventHandler, GatewayIntents, Http, Message, Ready, ShardManager,
};
use serenity::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::state::{CommsEvent, CommsState, Inbound};
use crate::error::AppError;
use crate::relay::command::{self, Command};
use crate::relay::{ConversationKey, ReplySink, Trigger};
use crate::subsystems::runtime::{Component, ComponentFuture};

// ── DiscordChannel ───────────────────────────────────────────────────────────

pub struct DiscordChannel {
    channel_id: String,
    token: String,
    state: Arc<CommsState>,
}

impl DiscordChannel {
    pub fn new(channel_id: impl Into<String>, token: String, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), token, state }
    }
}

impl Component for DiscordChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_discord(self.channel_id, self.token, self.state, shutdown))
    }
}

// ── Sink ─────────────────────────────────────────────────────────────────────

/// Replies to the triggering message in its channel.
struct DiscordSink {
    http: Arc<Http>,
    message: Message,
}

impl ReplySink for DiscordSink {
    async fn reply(&self, _trigger: &Trigger, text: String) -> Result<(), AppError> {
        self.message
            .reply(&*self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Comms(format!("discord send failed: {e}")))
    }

    async fn show_typing(&self, _conversation: &ConversationKey) -> Result<(), AppError> {
        self.message
            .channel_id
            .broadcast_typing(&self.http)
            .await
            .map_err(|e| AppError::Comms(format!("discord typing failed: {e}")))
    }
}

// ── Handler ──────────────────────────────────────────────────────────────────

struct Handler {
    channel_id: String,
    state: Arc<CommsState>,
    shards: Arc<OnceLock<Arc<ShardManager>>>,
    in_flight: TaskTracker,
}

impl Handler {
    async fn latency_ms(&self, ctx: &Context) -> Option<u128> {
        let manager = self.shards.get()?;
        let runners = manager.runners.lock().await;
        runners.get(&ctx.shard_id)?.latency.map(|d| d.as_millis())
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(channel_id = %self.channel_id, user = %ready.user.name, "discord connected");
        self.state.report_event(CommsEvent::ChannelReady { channel_id: self.channel_id.clone() });
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let bot_id = ctx.cache.current_user().id;
        let mention_token = format!("<@{bot_id}>");
        // Nickname mentions use `<@!id>`; fold them into the plain form.
        let text = msg.content.replace(&format!("<@!{bot_id}>"), &mention_token);

        // Ping answers here so it can carry the gateway latency.
        if command::parse(&text, self.state.command_prefix(), &mention_token) == Some(Command::Ping) {
            let reply = match self.latency_ms(&ctx).await {
                Some(ms) => format!("Pong! latency: {ms}ms"),
                None => "Pong!".to_string(),
            };
            if let Err(e) = msg.reply(&ctx, reply).await {
                warn!(channel_id = %self.channel_id, "discord send failed: {e}");
            }
            return;
        }

        debug!(
            channel_id = %self.channel_id,
            author = %msg.author.id,
            discord_channel = %msg.channel_id,
            "discord message"
        );

        let inbound = Inbound {
            sender: format!("discord:{}", msg.author.id),
            conversation: conversation_key(msg.channel_id),
            text,
            mention_token,
            direct: msg.guild_id.is_none(),
        };
        let sink = DiscordSink { http: ctx.http.clone(), message: msg };
        self.in_flight.track_future(self.state.handle(inbound, &sink)).await;
    }
}

fn conversation_key(channel: ChannelId) -> ConversationKey {
    format!("discord:{channel}").into()
}

// ── run_discord ──────────────────────────────────────────────────────────────

async fn run_discord(
    channel_id: String,
    token: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let shards = Arc::new(OnceLock::new());
    let in_flight = TaskTracker::new();
    let handler = Handler {
        channel_id: channel_id.clone(),
        state: state.clone(),
        shards: shards.clone(),
        in_flight: in_flight.clone(),
    };

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| AppError::Comms(format!("discord client error: {e}")))?;

    let manager = client.shard_manager.clone();
    let _ = shards.set(manager.clone());

    info!(%channel_id, "discord channel starting");

    let result = tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!(%channel_id, "shutdown signal received, closing discord channel");
            manager.shutdown_all().await;
            Ok(())
        }
        res = client.start() => {
            res.map_err(|e| AppError::Comms(format!("discord gateway error: {e}")))
        }
    };

    in_flight.close();
    in_flight.wait().await;

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    result
}
