//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! The relay prompt already carries the persona framing, so it is sent as a
//! single user message. All OpenAI wire types are private to this module.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::normalize::GenerationPayload;
use crate::llm::{InferenceRequest, ProviderError};

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Covers OpenAI, OpenAI-compatible local servers (Ollama, LM Studio…),
/// and hosted alternatives. Constructed once at startup, then cheaply cloned
/// because `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    temperature: f32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// `api_key` is `None` for keyless local models. When present it is sent
    /// as `Authorization: Bearer <key>` on every request.
    pub fn new(
        api_base_url: String,
        temperature: f32,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        Ok(Self { client, api_base_url, temperature, api_key })
    }

    pub async fn complete(&self, request: &InferenceRequest) -> Result<String, ProviderError> {
        // Some models (gpt-5 family) do not accept a temperature parameter.
        let temperature = if request.model.starts_with("gpt-5") {
            None
        } else {
            Some(self.temperature)
        };

        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: vec![Message { role: "user", content: &request.prompt }],
            temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            model = %payload.model,
            temperature = ?payload.temperature,
            prompt_len = request.prompt.len(),
            "sending chat completion request"
        );

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(env) => env.error.message,
                Err(_) => body.trim().to_string(),
            };
            error!(%status, %message, "LLM request returned HTTP error");
            return Err(ProviderError::Status { status: status.as_u16(), message });
        }

        trace!(body = %body, "full chat completion response body");

        // Unexpected shapes go through the generic normalization instead of failing.
        let text = match serde_json::from_str::<ChatCompletionResponse>(&body) {
            Ok(parsed) => parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|s| s.trim().to_string()),
            Err(_) => None,
        };

        match text {
            Some(text) => Ok(text),
            None => {
                let payload = GenerationPayload::from_body(&body);
                if let Some(message) = payload.provider_error() {
                    return Err(ProviderError::Rejected(message));
                }
                Ok(payload.normalize())
            }
        }
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
