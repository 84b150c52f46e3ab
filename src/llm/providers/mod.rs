//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory: called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod huggingface;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` / `HF_TOKEN` env (never TOML).
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "huggingface" | "hf" => {
            let hf = &config.huggingface;
            let p = huggingface::HuggingFaceProvider::new(
                hf.api_base_url.clone(),
                hf.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::HuggingFace(p))
        }
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.temperature,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn builds_each_known_provider() {
        let mut cfg = Config::test_default().llm;
        for name in ["dummy", "huggingface", "hf", "openai", "openai-compatible"] {
            cfg.provider = name.to_string();
            assert!(build(&cfg, None).is_ok(), "provider {name} should build");
        }
    }

    #[test]
    fn unknown_provider_errors() {
        let mut cfg = Config::test_default().llm;
        cfg.provider = "bedrock".into();
        let err = build(&cfg, None).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(ref p) if p == "bedrock"));
    }
}
