//! LLM provider abstraction and the inference client adapter.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! [`InferenceClient`] is the boundary the relay talks to: it runs each
//! provider call on its own Tokio task, bounds the wait with a timeout, and
//! folds every outcome into an [`InferenceResult`]. Nothing raised by a
//! provider crosses that boundary.

pub mod normalize;
pub mod providers;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

// ── Request / result ──────────────────────────────────────────────────────────

/// One generation call: the prompt text, the model id, and the token budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
}

/// Outcome of one inference call. Never partially populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceResult {
    Text(String),
    /// Human-readable diagnostic.
    Failure(String),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    HuggingFace(providers::huggingface::HuggingFaceProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// Send `request` to the provider and return its normalized text.
    pub async fn complete(&self, request: &InferenceRequest) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(request).await,
            LlmProvider::HuggingFace(p) => p.complete(request).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(request).await,
        }
    }
}

// ── Inference client ──────────────────────────────────────────────────────────

/// Stateless, cloneable front for one provider.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    provider: LlmProvider,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl InferenceClient {
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_tokens: u32, timeout: Duration) -> Self {
        Self { provider, model: model.into(), max_tokens, timeout }
    }

    /// Build the provider named by `config` and wrap it with that provider's
    /// model, token budget, and timeout.
    pub fn from_config(config: &LlmConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        let provider = providers::build(config, api_key)?;
        let (model, max_tokens, timeout_seconds) = config.active_limits();
        Ok(Self::new(provider, model, max_tokens, Duration::from_secs(timeout_seconds)))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Generate with the configured model and token budget.
    pub async fn generate(&self, prompt: &str) -> InferenceResult {
        self.generate_with(InferenceRequest {
            prompt: prompt.to_string(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        })
        .await
    }

    /// Run one provider call on a separate task and await only that task.
    ///
    /// A single attempt is made. On timeout the task is aborted.
    pub async fn generate_with(&self, request: InferenceRequest) -> InferenceResult {
        let provider = self.provider.clone();
        let model = request.model.clone();
        let mut task = tokio::spawn(async move { provider.complete(&request).await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(Ok(text))) => {
                debug!(%model, text_len = text.len(), "inference succeeded");
                InferenceResult::Text(text)
            }
            Ok(Ok(Err(e))) => {
                warn!(%model, error = %e, "inference failed");
                InferenceResult::Failure(e.to_string())
            }
            Ok(Err(join_err)) => {
                warn!(%model, error = %join_err, "inference task aborted");
                InferenceResult::Failure(format!("inference task failed: {join_err}"))
            }
            Err(_) => {
                task.abort();
                warn!(%model, timeout_ms = self.timeout.as_millis() as u64, "inference timed out");
                InferenceResult::Failure(format!(
                    "no response from model within {}s",
                    self.timeout.as_secs_f64()
                ))
            }
        }
    }
}
