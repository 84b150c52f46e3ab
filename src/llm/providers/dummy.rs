//! Dummy LLM provider: echoes the prompt back prefixed with `[echo]`.
//! Used for console runs and tests without a real API key.

use crate::llm::{InferenceRequest, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, request: &InferenceRequest) -> Result<String, ProviderError> {
        Ok(format!("[echo] {}", request.prompt))
    }
}
