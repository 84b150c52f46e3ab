//! Hugging Face text-generation provider (serverless Inference API).
//!
//! `POST {api_base_url}/{model}` with `{"inputs": …, "parameters": {…}}`.
//! The response shape depends on the model's pipeline, so the body is
//! classified as a [`GenerationPayload`] and normalized to text.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::normalize::GenerationPayload;
use crate::llm::{InferenceRequest, ProviderError};

/// Adapter for the Hugging Face inference endpoint.
///
/// Cheap to clone: `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct HuggingFaceProvider {
    client: Client,
    api_base_url: String,
    api_key: Option<String>,
}

impl HuggingFaceProvider {
    /// `api_key` is sent as `Authorization: Bearer <key>` when present.
    pub fn new(
        api_base_url: String,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        Ok(Self { client, api_base_url, api_key })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), model.trim_start_matches('/'))
    }

    /// One round-trip. No retries; "model loading" comes back as an error.
    pub async fn complete(&self, request: &InferenceRequest) -> Result<String, ProviderError> {
        let url = self.endpoint(&request.model);
        let payload = GenerationRequest {
            inputs: &request.prompt,
            parameters: GenerationParameters {
                max_new_tokens: request.max_tokens,
                return_full_text: false,
            },
            options: GenerationOptions { wait_for_model: false },
        };

        debug!(%url, max_new_tokens = request.max_tokens, prompt_len = request.prompt.len(), "sending generation request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full generation request payload");
        }

        let mut req = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(%url, error = %e, "generation request failed (transport)");
            ProviderError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let message = error_message(&body);
            error!(%status, %message, "generation request returned HTTP error");
            return Err(ProviderError::Status { status: status.as_u16(), message });
        }

        trace!(body = %body, "full generation response body");

        let payload = GenerationPayload::from_body(&body);
        if let Some(message) = payload.provider_error() {
            error!(%message, "provider rejected generation request");
            return Err(ProviderError::Rejected(message));
        }

        Ok(payload.normalize())
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
    options: GenerationOptions,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct GenerationOptions {
    wait_for_model: bool,
}

// Error envelope returned on non-2xx, e.g. `{"error": "...", "estimated_time": 20.0}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: serde_json::Value,
    #[serde(default)]
    estimated_time: Option<f64>,
}

/// Human-readable diagnostic from an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => {
            let msg = match env.error {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            match env.estimated_time {
                Some(secs) => format!("{msg} (estimated time {secs:.0}s)"),
                None => msg,
            }
        }
        Err(_) if body.trim().is_empty() => "<empty body>".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
