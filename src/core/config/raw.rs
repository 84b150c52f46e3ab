//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape: serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub supervisor: RawSupervisor,
    #[serde(default)]
    pub relay: RawRelay,
    #[serde(default)]
    pub llm: RawLlm,
    #[serde(default)]
    pub comms: RawComms,
}

#[derive(Deserialize)]
pub(super) struct RawSupervisor {
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawSupervisor {
    fn default() -> Self {
        Self { bot_name: default_bot_name(), log_level: default_log_level(), log_file: None }
    }
}

// ── Relay ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawRelay {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,
    #[serde(default = "default_user_cooldown_seconds")]
    pub user_cooldown_seconds: f64,
    #[serde(default = "default_cooldown_capacity")]
    pub cooldown_capacity: usize,
    #[serde(default = "default_reply_ceiling")]
    pub reply_ceiling: usize,
    #[serde(default = "default_truncation_marker")]
    pub truncation_marker: String,
    #[serde(default = "default_cooldown_message")]
    pub cooldown_message: String,
    #[serde(default = "default_user_cooldown_message")]
    pub user_cooldown_message: String,
    /// Inline persona text; wins over `persona_file` when both are set.
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default = "default_persona_file")]
    pub persona_file: String,
    #[serde(default = "default_user_label")]
    pub user_label: String,
    #[serde(default = "default_assistant_label")]
    pub assistant_label: String,
}

impl Default for RawRelay {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            cooldown_seconds: default_cooldown_seconds(),
            user_cooldown_seconds: default_user_cooldown_seconds(),
            cooldown_capacity: default_cooldown_capacity(),
            reply_ceiling: default_reply_ceiling(),
            truncation_marker: default_truncation_marker(),
            cooldown_message: default_cooldown_message(),
            user_cooldown_message: default_user_cooldown_message(),
            persona: None,
            persona_file: default_persona_file(),
            user_label: default_user_label(),
            assistant_label: default_assistant_label(),
        }
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub huggingface: RawHuggingFaceConfig,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            huggingface: RawHuggingFaceConfig::default(),
            openai: RawOpenAiConfig::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawHuggingFaceConfig {
    #[serde(default = "default_hf_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_hf_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawHuggingFaceConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_hf_api_base_url(),
            model: default_hf_model(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// ── Comms ───────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(super) struct RawComms {
    #[serde(default)]
    pub pty: RawPty,
    #[serde(default)]
    pub discord: RawToggle,
    #[serde(default)]
    pub telegram: RawToggle,
}

#[derive(Deserialize)]
pub(super) struct RawPty {
    /// Defaults to `true`; main still gates it behind `-i`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RawPty {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Platform channels must be explicitly enabled.
#[derive(Deserialize, Default)]
pub(super) struct RawToggle {
    #[serde(default)]
    pub enabled: bool,
}

// ── Defaults ────────────────────────────────────────────────────────────────

pub(super) fn default_bot_name() -> String { "relay".to_string() }
pub(super) fn default_log_level() -> String { "info".to_string() }
pub(super) fn default_command_prefix() -> String { "!".to_string() }
pub(super) fn default_cooldown_seconds() -> f64 { 5.0 }
pub(super) fn default_user_cooldown_seconds() -> f64 { 10.0 }
pub(super) fn default_cooldown_capacity() -> usize { 10_000 }
pub(super) fn default_reply_ceiling() -> usize { 1900 }
pub(super) fn default_truncation_marker() -> String { "\n\n...[truncated]".to_string() }
pub(super) fn default_cooldown_message() -> String {
    "Please wait a few seconds between questions in this channel.".to_string()
}
pub(super) fn default_user_cooldown_message() -> String {
    "You're asking too quickly. Try again in a few seconds.".to_string()
}
pub(super) fn default_persona_file() -> String { "config/prompts/persona.txt".to_string() }
pub(super) fn default_user_label() -> String { "User".to_string() }
pub(super) fn default_assistant_label() -> String { "Assistant".to_string() }
pub(super) fn default_llm_provider() -> String { "huggingface".to_string() }
pub(super) fn default_hf_api_base_url() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}
pub(super) fn default_hf_model() -> String { "gpt2".to_string() }
pub(super) fn default_openai_api_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
pub(super) fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
pub(super) fn default_openai_temperature() -> f32 { 0.7 }
pub(super) fn default_max_tokens() -> u32 { 200 }
pub(super) fn default_timeout_seconds() -> u64 { 60 }

fn default_true() -> bool {
    true
}
