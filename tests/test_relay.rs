//! End-to-end relay tests against an in-process mock inference endpoint.

use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tempfile::NamedTempFile;

use relay_bot::config::{self, EnvOverrides};
use relay_bot::error::AppError;
use relay_bot::relay::clock::ManualClock;
use relay_bot::relay::{ConversationKey, Outcome, Relay, ReplySink, Trigger};

// ── Mock endpoint ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

async fn generate(State(hits): State<Hits>, Path(model): Path<String>, Json(body): Json<Value>) -> Response {
    hits.0.fetch_add(1, Ordering::SeqCst);
    match model.as_str() {
        "list" => Json(json!([{ "generated_text": "hello" }])).into_response(),
        "object" => Json(json!({ "generated_text": "from an object" })).into_response(),
        "plain" => "not json at all".into_response(),
        "empty" => Json(json!([{ "generated_text": "" }])).into_response(),
        "long" => Json(json!([{ "generated_text": "x".repeat(2500) }])).into_response(),
        "loading" => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Model loading is in progress", "estimated_time": 20.0 })),
        )
            .into_response(),
        "inspect" => {
            let reflected = format!(
                "{}|{}|{}",
                body["inputs"].as_str().unwrap_or_default(),
                body["parameters"]["max_new_tokens"],
                body["parameters"]["return_full_text"],
            );
            Json(json!([{ "generated_text": reflected }])).into_response()
        }
        "slow" => {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Json(json!([{ "generated_text": "slow answer" }])).into_response()
        }
        "hang" => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Json(json!([{ "generated_text": "too late" }])).into_response()
        }
        _ => (StatusCode::NOT_FOUND, "unknown model").into_response(),
    }
}

async fn spawn_mock() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new().route("/{model}", post(generate)).with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

// ── Relay setup ───────────────────────────────────────────────────────────────

fn relay_for(base_url: &str, model: &str, timeout_seconds: u64) -> Relay {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[relay]
persona = "You are Juan."
user_cooldown_seconds = 0.0

[llm]
default = "huggingface"

[llm.huggingface]
api_base_url = "{base_url}"
model = "{model}"
max_tokens = 64
timeout_seconds = {timeout_seconds}
"#
    )
    .unwrap();
    let cfg = config::load_from(file.path(), &EnvOverrides::default()).unwrap();
    Relay::from_config(&cfg).unwrap()
}

#[derive(Default)]
struct Recorder {
    replies: Mutex<Vec<String>>,
}

impl Recorder {
    fn texts(&self) -> Vec<String> {
        self.replies.lock().unwrap().clone()
    }
}

impl ReplySink for Recorder {
    async fn reply(&self, _trigger: &Trigger, text: String) -> Result<(), AppError> {
        self.replies.lock().unwrap().push(text);
        Ok(())
    }

    async fn show_typing(&self, _conversation: &ConversationKey) -> Result<(), AppError> {
        Ok(())
    }
}

fn ask(conversation: &str, text: &str) -> Trigger {
    Trigger {
        sender: "user-1".into(),
        text: text.into(),
        conversation: conversation.into(),
        addressed: true,
        bot_token: "<@123>".into(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_payload_is_normalized_to_generated_text() {
    let (base, _) = spawn_mock().await;
    let relay = relay_for(&base, "list", 5);
    let sink = Recorder::default();
    let outcome = relay.dispatch(&ask("c1", "<@123> say hi"), &sink).await;
    assert_eq!(outcome, Outcome::Answered { truncated: false });
    assert_eq!(sink.texts(), vec!["hello".to_string()]);
}

#[tokio::test]
async fn object_and_plain_payloads_are_rendered() {
    let (base, _) = spawn_mock().await;
    let sink = Recorder::default();
    relay_for(&base, "object", 5).dispatch(&ask("c1", "q"), &sink).await;
    relay_for(&base, "plain", 5).dispatch(&ask("c1", "q"), &sink).await;
    assert_eq!(sink.texts(), vec!["from an object".to_string(), "not json at all".to_string()]);
}

#[tokio::test]
async fn request_carries_framed_prompt_and_token_budget() {
    let (base, _) = spawn_mock().await;
    let relay = relay_for(&base, "inspect", 5);
    let sink = Recorder::default();
    relay.dispatch(&ask("c1", "<@123> how are you"), &sink).await;
    assert_eq!(
        sink.texts()[0],
        "You are Juan.\n\nUser: how are you\nAssistant:|64|false"
    );
}

#[tokio::test]
async fn empty_generation_gets_placeholder() {
    let (base, _) = spawn_mock().await;
    let sink = Recorder::default();
    let outcome = relay_for(&base, "empty", 5).dispatch(&ask("c1", "q"), &sink).await;
    assert_eq!(outcome, Outcome::Answered { truncated: false });
    assert_eq!(sink.texts(), vec!["(empty response)".to_string()]);
}

#[tokio::test]
async fn oversized_generation_is_truncated() {
    let (base, _) = spawn_mock().await;
    let sink = Recorder::default();
    let outcome = relay_for(&base, "long", 5).dispatch(&ask("c1", "q"), &sink).await;
    assert_eq!(outcome, Outcome::Answered { truncated: true });
    let reply = &sink.texts()[0];
    assert!(reply.starts_with(&"x".repeat(1900)));
    assert!(reply.ends_with("\n\n...[truncated]"));
    assert_eq!(reply.chars().count(), 1900 + "\n\n...[truncated]".chars().count());
}

#[tokio::test]
async fn loading_model_surfaces_provider_message() {
    let (base, _) = spawn_mock().await;
    let sink = Recorder::default();
    let outcome = relay_for(&base, "loading", 5).dispatch(&ask("c1", "q"), &sink).await;
    assert_eq!(outcome, Outcome::Failed);
    let reply = &sink.texts()[0];
    assert!(reply.starts_with("Error: HTTP 503"), "got {reply}");
    assert!(reply.contains("Model loading is in progress"));
}

#[tokio::test]
async fn unreachable_endpoint_yields_single_error_reply() {
    let relay = relay_for("http://127.0.0.1:1", "gpt2", 5);
    let sink = Recorder::default();
    let outcome = relay.dispatch(&ask("c1", "q"), &sink).await;
    assert_eq!(outcome, Outcome::Failed);
    let texts = sink.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Error: "));
}

#[tokio::test]
async fn hung_endpoint_times_out() {
    let (base, _) = spawn_mock().await;
    let relay = relay_for(&base, "hang", 1);
    let sink = Recorder::default();
    let started = Instant::now();
    let outcome = relay.dispatch(&ask("c1", "q"), &sink).await;
    assert_eq!(outcome, Outcome::Failed);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sink.texts().len(), 1);
}

#[tokio::test]
async fn rejected_trigger_makes_no_remote_call() {
    let (base, hits) = spawn_mock().await;
    let clock = Arc::new(ManualClock::default());
    let relay = relay_for(&base, "list", 5).with_clock(clock.clone());
    let sink = Recorder::default();

    assert!(matches!(relay.dispatch(&ask("c1", "one"), &sink).await, Outcome::Answered { .. }));
    clock.advance(Duration::from_secs(2));
    assert_eq!(relay.dispatch(&ask("c1", "two"), &sink).await, Outcome::Deflected);
    clock.advance(Duration::from_secs(4));
    assert!(matches!(relay.dispatch(&ask("c1", "three"), &sink).await, Outcome::Answered { .. }));

    assert_eq!(hits.0.load(Ordering::SeqCst), 2);
    assert_eq!(
        sink.texts(),
        vec![
            "hello".to_string(),
            "Please wait a few seconds between questions in this channel.".to_string(),
            "hello".to_string(),
        ]
    );
}

#[tokio::test]
async fn conversations_are_served_concurrently() {
    let (base, _) = spawn_mock().await;
    let relay = relay_for(&base, "slow", 5);
    let (a, b) = (Recorder::default(), Recorder::default());

    let (m1, m2) = (ask("c1", "q"), ask("c2", "q"));

    let started = Instant::now();
    let (ra, rb) = tokio::join!(
        relay.dispatch(&m1, &a),
        relay.dispatch(&m2, &b),
    );
    let elapsed = started.elapsed();

    assert_eq!(ra, Outcome::Answered { truncated: false });
    assert_eq!(rb, Outcome::Answered { truncated: false });
    assert!(elapsed < Duration::from_millis(750), "calls ran serially: {elapsed:?}");
}
