//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `RELAY_LOG_LEVEL` and `HF_MODEL` env overrides. Tokens and
//! API keys come from the environment only.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs consumed by the relay and
//!   its channels (`Config`, `RelayConfig`, `LlmConfig`, etc.).
//! - **raw**: Raw TOML deserialization types (`RawConfig`, `RawRelay`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load**: Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`, `Config::validate`.

mod load;
mod raw;
mod types;

pub use load::{EnvOverrides, expand_home, load, load_from};
pub use types::*;

#[cfg(test)]
impl Config {
    /// Safe `Config` for unit tests: dummy LLM, no API keys, no external calls.
    pub fn test_default() -> Self {
        let mut cfg = load::resolve(raw::RawConfig::default(), &EnvOverrides::default())
            .expect("built-in defaults resolve");
        cfg.llm.provider = "dummy".into();
        cfg.relay.persona = PersonaSource::Inline("You are a test bot.".into());
        cfg
    }
}
