//! Public configuration structs consumed by the relay and its channels.

use std::path::PathBuf;
use std::time::Duration;

/// PTY (console) channel configuration.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    pub enabled: bool,
}

/// Discord channel configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub enabled: bool,
}

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub pty: PtyConfig,
    pub discord: DiscordConfig,
    pub telegram: TelegramConfig,
}

/// Where the persona framing comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonaSource {
    /// Literal text from `persona = "..."`.
    Inline(String),
    /// Prompt file from `persona_file = "..."` (already `~`-expanded).
    File(PathBuf),
}

/// Gating, prompt framing, and reply shaping for the dispatch pipeline.
/// Populated from `[relay]`.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Prefix for explicit commands (`!ask`, `!ping`, `!help`).
    pub command_prefix: String,
    /// Minimum spacing between admitted calls for one conversation.
    pub cooldown: Duration,
    /// Minimum spacing between admitted calls for one sender.
    /// `None` disables the per-sender gate.
    pub user_cooldown: Option<Duration>,
    /// Maximum number of conversations tracked by the cooldown gate.
    pub cooldown_capacity: usize,
    /// Hard ceiling on reply content, in characters.
    pub reply_ceiling: usize,
    /// Appended when a reply was cut at the ceiling.
    pub truncation_marker: String,
    /// Reply for triggers rejected by the conversation gate.
    pub cooldown_message: String,
    /// Reply for triggers rejected by the per-sender gate.
    pub user_cooldown_message: String,
    pub persona: PersonaSource,
    pub user_label: String,
    pub assistant_label: String,
}

/// Hugging Face text-generation provider configuration.
/// Populated from `[llm.huggingface]` in the TOML.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    /// Base URL; the model id is appended as the final path segment.
    pub api_base_url: String,
    pub model: String,
    /// Upper bound on generated tokens (`max_new_tokens`).
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"huggingface"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub huggingface: HuggingFaceConfig,
    pub openai: OpenAiConfig,
}

impl LlmConfig {
    /// `(model, max_tokens, timeout_seconds)` of the active provider.
    pub fn active_limits(&self) -> (String, u32, u64) {
        match self.provider.as_str() {
            "openai" | "openai-compatible" => (
                self.openai.model.clone(),
                self.openai.max_tokens,
                self.openai.timeout_seconds,
            ),
            "huggingface" | "hf" => (
                self.huggingface.model.clone(),
                self.huggingface.max_tokens,
                self.huggingface.timeout_seconds,
            ),
            _ => ("dummy".to_string(), self.huggingface.max_tokens, self.huggingface.timeout_seconds),
        }
    }

    /// Whether the active provider needs a bearer credential.
    pub fn requires_api_key(&self) -> bool {
        matches!(self.provider.as_str(), "huggingface" | "hf")
    }
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    /// Append logs here instead of stderr. Keeps the interactive console
    /// readable while gateway crates log at debug.
    pub log_file: Option<PathBuf>,
    pub relay: RelayConfig,
    pub llm: LlmConfig,
    pub comms: CommsConfig,
    /// From `LLM_API_KEY` (or `HF_TOKEN`) env: never TOML.
    pub llm_api_key: Option<String>,
    /// From `DISCORD_TOKEN` env: never TOML.
    pub discord_token: Option<String>,
    /// From `TELEGRAM_BOT_TOKEN` env: never TOML.
    pub telegram_token: Option<String>,
}

impl Config {
    /// Returns `true` if the PTY channel should be loaded.
    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }

    /// Returns `true` if the Discord channel should be loaded.
    pub fn comms_discord_should_load(&self) -> bool {
        self.comms.discord.enabled
    }

    /// Returns `true` if the Telegram channel should be loaded.
    pub fn comms_telegram_should_load(&self) -> bool {
        self.comms.telegram.enabled
    }
}
