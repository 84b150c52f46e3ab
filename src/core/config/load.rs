//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `RELAY_LOG_LEVEL` / `HF_MODEL` env overrides. Secrets are
//! only ever read from the environment.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

/// Values sourced from the process environment.
///
/// Collected once by [`EnvOverrides::from_env`]; tests build one directly
/// instead of mutating env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub hf_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub discord_token: Option<String>,
    pub telegram_token: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            log_level: non_empty_var("RELAY_LOG_LEVEL"),
            log_file: non_empty_var("RELAY_LOG_FILE"),
            hf_model: non_empty_var("HF_MODEL"),
            llm_api_key: non_empty_var("LLM_API_KEY").or_else(|| non_empty_var("HF_TOKEN")),
            discord_token: non_empty_var("DISCORD_TOKEN"),
            telegram_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Deep-merge two TOML values.
/// Tables are merged recursively: the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = EnvOverrides::from_env();

    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        resolve(RawConfig::default(), &overrides)
    }
}

/// Internal loader: accepts an explicit path and pre-collected overrides.
pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let mut visited = HashSet::new();
    let mut merged = load_raw_merged(path, &mut visited)?;
    if let toml::Value::Table(tbl) = &mut merged {
        tbl.remove("meta");
    }

    let parsed = RawConfig::deserialize(merged)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    resolve(parsed, overrides)
}

pub(super) fn resolve(parsed: RawConfig, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let s = parsed.supervisor;
    let r = parsed.relay;
    let log_level = overrides.log_level.clone().unwrap_or(s.log_level);
    let log_file = overrides
        .log_file
        .clone()
        .or(s.log_file)
        .filter(|p| !p.trim().is_empty())
        .map(|p| expand_home(&p));

    let cooldown = seconds("relay.cooldown_seconds", r.cooldown_seconds)?;
    let user_cooldown = seconds("relay.user_cooldown_seconds", r.user_cooldown_seconds)?;
    let user_cooldown = (!user_cooldown.is_zero()).then_some(user_cooldown);

    if r.reply_ceiling == 0 {
        return Err(AppError::Config("relay.reply_ceiling must be greater than 0".into()));
    }
    if r.cooldown_capacity == 0 {
        return Err(AppError::Config("relay.cooldown_capacity must be greater than 0".into()));
    }

    let persona = match r.persona {
        Some(text) => PersonaSource::Inline(text),
        None => PersonaSource::File(expand_home(&r.persona_file)),
    };

    let hf = parsed.llm.huggingface;
    let oai = parsed.llm.openai;

    Ok(Config {
        bot_name: s.bot_name,
        log_level,
        log_file,
        relay: RelayConfig {
            command_prefix: r.command_prefix,
            cooldown,
            user_cooldown,
            cooldown_capacity: r.cooldown_capacity,
            reply_ceiling: r.reply_ceiling,
            truncation_marker: r.truncation_marker,
            cooldown_message: r.cooldown_message,
            user_cooldown_message: r.user_cooldown_message,
            persona,
            user_label: r.user_label,
            assistant_label: r.assistant_label,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            huggingface: HuggingFaceConfig {
                api_base_url: hf.api_base_url,
                model: overrides.hf_model.clone().unwrap_or(hf.model),
                max_tokens: hf.max_tokens,
                timeout_seconds: hf.timeout_seconds,
            },
            openai: OpenAiConfig {
                api_base_url: oai.api_base_url,
                model: oai.model,
                temperature: oai.temperature,
                max_tokens: oai.max_tokens,
                timeout_seconds: oai.timeout_seconds,
            },
        },
        comms: CommsConfig {
            pty: PtyConfig { enabled: parsed.comms.pty.enabled },
            discord: DiscordConfig { enabled: parsed.comms.discord.enabled },
            telegram: TelegramConfig { enabled: parsed.comms.telegram.enabled },
        },
        llm_api_key: overrides.llm_api_key.clone(),
        discord_token: overrides.discord_token.clone(),
        telegram_token: overrides.telegram_token.clone(),
    })
}

fn seconds(field: &str, value: f64) -> Result<Duration, AppError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| AppError::Config(format!("{field} = {value}: {e}")))
}

impl Config {
    /// Startup check for credentials the enabled components cannot run without.
    /// Channels whose feature is compiled out never start, so their tokens
    /// are not required.
    ///
    /// Returns [`AppError::ConfigurationMissing`] naming the first absent value.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.llm.requires_api_key() && self.llm_api_key.is_none() {
            return Err(AppError::ConfigurationMissing(format!(
                "LLM_API_KEY (or HF_TOKEN) not set; required by provider '{}'",
                self.llm.provider
            )));
        }
        if cfg!(feature = "channel-discord") && self.comms.discord.enabled && self.discord_token.is_none() {
            return Err(AppError::ConfigurationMissing(
                "DISCORD_TOKEN not set; required by the discord channel".into(),
            ));
        }
        if cfg!(feature = "channel-telegram") && self.comms.telegram.enabled && self.telegram_token.is_none() {
            return Err(AppError::ConfigurationMissing(
                "TELEGRAM_BOT_TOKEN not set; required by the telegram channel".into(),
            ));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
