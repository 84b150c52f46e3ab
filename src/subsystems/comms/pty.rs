//! PTY (console) channel: reads lines from stdin, relays them, and prints
//! the reply to stdout.
//!
//! The console is a one-to-one conversation, so every non-command line is
//! an ask. Each line is handled on its own tracked task so the prompt keeps
//! reading while a call is in flight. Runs until `shutdown` is cancelled
//! (Ctrl-C) or stdin is closed; either way the channel only reports
//! shutdown once every in-flight line has been answered.

use std::io::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::state::{CommsEvent, CommsState, Inbound};
use crate::error::AppError;
use crate::relay::{ReplySink, Trigger};
use crate::subsystems::runtime::{Component, ComponentFuture};

// ── PtyChannel ───────────────────────────────────────────────────────────────

pub struct PtyChannel {
    channel_id: String,
    state: Arc<CommsState>,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state }
    }
}

impl Component for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_pty(self.channel_id, self.state, shutdown))
    }
}

// ── ConsoleSink ──────────────────────────────────────────────────────────────

/// Prints replies to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl ReplySink for ConsoleSink {
    async fn reply(&self, _trigger: &Trigger, text: String) -> Result<(), AppError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{text}")?;
        write!(out, "> ")?;
        out.flush()?;
        Ok(())
    }
}

// ── run_pty ──────────────────────────────────────────────────────────────────

async fn run_pty(
    channel_id: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "pty channel started");
    println!("─────────────────────────────────");
    println!(" relay console  (Ctrl-C to quit)");
    println!(" {}help for commands", state.command_prefix());
    println!("─────────────────────────────────");

    state.report_event(CommsEvent::ChannelReady { channel_id: channel_id.clone() });

    let stdin = BufReader::new(tokio::io::stdin());
    serve_lines(&channel_id, &state, stdin, Arc::new(ConsoleSink), &shutdown).await;

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}

/// Relay every non-empty line of `input` until it closes or `shutdown`
/// fires, then wait for the replies still in flight.
async fn serve_lines<R, S>(
    channel_id: &str,
    state: &Arc<CommsState>,
    input: R,
    sink: Arc<S>,
    shutdown: &CancellationToken,
) where
    R: AsyncBufRead + Unpin,
    S: ReplySink + 'static,
{
    let mut lines = input.lines();
    let in_flight = TaskTracker::new();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(%channel_id, "pty channel shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!(%channel_id, "pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!(%channel_id, "pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        let input = input.trim().to_string();
                        if input.is_empty() {
                            continue;
                        }
                        debug!(%channel_id, input_len = input.len(), "pty received line");

                        let inbound = Inbound {
                            sender: "console".to_string(),
                            conversation: format!("pty:{channel_id}").into(),
                            text: input,
                            mention_token: String::new(),
                            direct: true,
                        };
                        let state = state.clone();
                        let sink = sink.clone();
                        in_flight.spawn(async move {
                            state.handle(inbound, &*sink).await;
                        });
                    }
                }
            }
        }
    }

    in_flight.close();
    if !in_flight.is_empty() {
        info!(%channel_id, pending = in_flight.len(), "waiting for in-flight replies");
    }
    in_flight.wait().await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::Router;
    use axum::routing::post;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::Config;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::llm::providers::huggingface::HuggingFaceProvider;
    use crate::llm::{InferenceClient, LlmProvider};
    use crate::relay::Relay;
    use crate::relay::prompt::PromptBuilder;
    use crate::relay::testing::RecordingSink;

    fn state_with(provider: LlmProvider, model: &str) -> Arc<CommsState> {
        let mut cfg = Config::test_default().relay;
        cfg.user_cooldown = None;
        cfg.cooldown = Duration::ZERO;
        let client = InferenceClient::new(provider, model, 16, Duration::from_secs(5));
        let relay = Relay::new(&cfg, PromptBuilder::new("P"), client);
        let (tx, _rx) = mpsc::channel(4);
        Arc::new(CommsState::new(Arc::new(relay), tx))
    }

    /// Endpoint that answers every model after a noticeable delay.
    async fn spawn_slow_endpoint() -> String {
        let app = Router::new().route(
            "/{model}",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                axum::Json(json!([{ "generated_text": "slow answer" }]))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn reply_in_flight_at_end_of_input_is_delivered() {
        let base = spawn_slow_endpoint().await;
        let provider = LlmProvider::HuggingFace(HuggingFaceProvider::new(base, 5, None).unwrap());
        let state = state_with(provider, "gpt2");
        let sink = Arc::new(RecordingSink::default());

        serve_lines("pty0", &state, &b"hello\n"[..], sink.clone(), &CancellationToken::new()).await;

        assert_eq!(sink.texts(), vec!["slow answer".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_still_waits_for_started_lines() {
        let base = spawn_slow_endpoint().await;
        let provider = LlmProvider::HuggingFace(HuggingFaceProvider::new(base, 5, None).unwrap());
        let state = state_with(provider, "gpt2");
        let sink = Arc::new(RecordingSink::default());
        let shutdown = CancellationToken::new();

        // stdin stays open; only the token ends the loop.
        let (mut tx, rx) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut tx, b"hello\n").await.unwrap();
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        serve_lines("pty0", &state, BufReader::new(rx), sink.clone(), &shutdown).await;

        assert_eq!(sink.texts(), vec!["slow answer".to_string()]);
        drop(tx);
    }

    #[tokio::test]
    async fn blank_lines_are_skipped_and_commands_answered() {
        let state = state_with(LlmProvider::Dummy(DummyProvider), "dummy");
        let sink = Arc::new(RecordingSink::default());

        serve_lines("pty0", &state, &b"\n   \n!ping\n"[..], sink.clone(), &CancellationToken::new()).await;

        assert_eq!(sink.texts(), vec!["Pong!".to_string()]);
    }
}
