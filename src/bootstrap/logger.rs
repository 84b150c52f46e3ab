//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the effective level is resolved.
//! A bare level such as `"debug"` applies to the relay itself; the gateway
//! and HTTP crates underneath stay at `warn` so a verbose console is not
//! buried in heartbeat and connection-pool noise. Pass a full `EnvFilter`
//! directive to control them explicitly.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::AppError;

/// Crates that log every heartbeat, poll or pooled connection at debug.
const NOISY_TARGETS: &[&str] = &["serenity", "teloxide", "reqwest", "hyper", "h2", "rustls", "tungstenite"];

/// Initialise the global tracing subscriber.
///
/// If `prefer_level` is `true` (a `-v` flag was given), `level` wins and
/// `RUST_LOG` is only a fallback for an invalid `level`. Otherwise `RUST_LOG`
/// wins and `level` is the fallback.
///
/// Output goes to stderr, or is appended to `log_file` when one is set.
pub fn init(level: &str, prefer_level: bool, log_file: Option<&Path>) -> Result<(), AppError> {
    let filter = build_filter(level, prefer_level)?;

    let writer = match log_file {
        Some(path) => BoxMakeWriter::new(open_log_file(path)?),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

fn build_filter(level: &str, prefer_level: bool) -> Result<EnvFilter, AppError> {
    let directives = directives(level);
    if prefer_level {
        EnvFilter::try_new(&directives).or_else(|level_err| {
            EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!(
                    "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
                ))
            })
        })
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&directives))
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
    }
}

/// Expand a bare level into a directive that caps [`NOISY_TARGETS`].
/// `trace`, `off` and full directives pass through unchanged.
fn directives(level: &str) -> String {
    let level = level.trim();
    let bare = !level.is_empty() && level.chars().all(|c| c.is_ascii_alphabetic());
    if !bare || level.eq_ignore_ascii_case("trace") || level.eq_ignore_ascii_case("off") {
        return level.to_string();
    }
    NOISY_TARGETS
        .iter()
        .fold(level.to_string(), |acc, target| format!("{acc},{target}=warn"))
}

fn open_log_file(path: &Path) -> Result<File, AppError> {
    let fail = |e: std::io::Error| AppError::Logger(format!("failed to open log file '{}': {e}", path.display()));
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(fail)?;
    }
    OpenOptions::new().create(true).append(true).open(path).map_err(fail)
}
