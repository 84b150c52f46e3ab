//! Comms subsystem: owns every chat channel.
//!
//! Each channel (PTY, Discord, Telegram) implements
//! [`runtime::Component`](crate::subsystems::runtime::Component) and is
//! spawned by [`start`]. Channels capture an [`Arc<CommsState>`] at
//! construction; that state is their only way to reach the relay.
//!
//! An intra-subsystem [`mpsc`] channel carries lifecycle events back to a
//! small drain task, which dies once every channel has dropped its sender.

#[cfg(feature = "channel-discord")]
pub mod discord;
#[cfg(feature = "channel-pty")]
pub mod pty;
mod state;
#[cfg(feature = "channel-telegram")]
pub mod telegram;

pub use state::{CommsEvent, CommsState, Handled, Inbound};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::relay::Relay;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

/// Names of the channels [`start`] would load for `config`, in start order.
pub fn planned_channels(config: &Config) -> Vec<&'static str> {
    let mut names = Vec::new();
    if cfg!(feature = "channel-pty") && config.comms_pty_should_load() {
        names.push("pty");
    }
    if cfg!(feature = "channel-discord") && config.comms_discord_should_load() {
        names.push("discord");
    }
    if cfg!(feature = "channel-telegram") && config.comms_telegram_should_load() {
        names.push("telegram");
    }
    names
}

/// Spawn all configured channels and return a [`SubsystemHandle`].
///
/// Synchronous: returns as soon as the tasks are spawned. If any channel
/// exits with an error the shared `shutdown` token is cancelled.
pub fn start(config: &Config, relay: Arc<Relay>, shutdown: CancellationToken) -> SubsystemHandle {
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(32);
    let state = Arc::new(CommsState::new(relay, event_tx));

    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-pty")]
    {
        if config.comms_pty_should_load() {
            info!("loading pty channel");
            components.push(Box::new(pty::PtyChannel::new("pty0", state.clone())));
        }
    }

    #[cfg(feature = "channel-discord")]
    {
        if config.comms_discord_should_load() {
            match config.discord_token.clone() {
                Some(token) => {
                    info!("loading discord channel");
                    components.push(Box::new(discord::DiscordChannel::new("discord0", token, state.clone())));
                }
                None => warn!("discord enabled but DISCORD_TOKEN is not set; skipping"),
            }
        }
    }

    #[cfg(feature = "channel-telegram")]
    {
        if config.comms_telegram_should_load() {
            match config.telegram_token.clone() {
                Some(token) => {
                    info!("loading telegram channel");
                    components.push(Box::new(telegram::TelegramChannel::new("telegram0", token, state.clone())));
                }
                None => warn!("telegram enabled but TELEGRAM_BOT_TOKEN is not set; skipping"),
            }
        }
    }

    if components.is_empty() {
        info!("no comms channels configured");
    }

    // `state` (and its sender) now lives only inside the channels.
    drop(state);

    tokio::spawn(async move {
        let mut rx = event_rx;
        while let Some(event) = rx.recv().await {
            match event {
                CommsEvent::ChannelReady { ref channel_id } => {
                    debug!(channel_id, "channel ready");
                }
                CommsEvent::ChannelShutdown { ref channel_id } => {
                    debug!(channel_id, "channel reported shutdown");
                }
            }
        }
    });

    spawn_components(components, shutdown)
}
