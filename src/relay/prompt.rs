//! Prompt builder: persona framing plus the sanitized user turn.
//!
//! ```text
//! <persona>
//!
//! User: <cleaned text>
//! Assistant:
//! ```

use std::fmt;
use std::fs;

use tracing::{debug, warn};

use crate::config::{PersonaSource, RelayConfig};

/// Used when the configured persona file is missing or empty.
pub const DEFAULT_PERSONA: &str =
    "You are a helpful, friendly assistant in a group chat. Answer briefly and clearly.";

/// An inference-ready prompt. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
    user_label: String,
    assistant_label: String,
}

impl PromptBuilder {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            user_label: "User".to_string(),
            assistant_label: "Assistant".to_string(),
        }
    }

    pub fn with_labels(mut self, user: impl Into<String>, assistant: impl Into<String>) -> Self {
        self.user_label = user.into();
        self.assistant_label = assistant.into();
        self
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(load_persona(&config.persona))
            .with_labels(config.user_label.clone(), config.assistant_label.clone())
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Frame `raw_text` for the model, stripping every `bot_token` first.
    ///
    /// Empty cleaned text still yields a prompt.
    pub fn build(&self, raw_text: &str, bot_token: &str) -> Prompt {
        let cleaned = strip_token(raw_text, bot_token);
        Prompt(format!(
            "{}\n\n{}: {}\n{}:",
            self.persona.trim(),
            self.user_label,
            cleaned,
            self.assistant_label
        ))
    }
}

/// Remove every standalone occurrence of `token` and trim surrounding
/// whitespace. An empty token strips nothing.
pub fn strip_token(raw_text: &str, token: &str) -> String {
    if token.is_empty() {
        return raw_text.trim().to_string();
    }
    let mut cleaned = String::with_capacity(raw_text.len());
    let mut copied = 0;
    for start in token_matches(raw_text, token) {
        cleaned.push_str(&raw_text[copied..start]);
        copied = start + token.len();
    }
    cleaned.push_str(&raw_text[copied..]);
    cleaned.trim().to_string()
}

/// True when `text` mentions `token` as a whole word.
pub fn contains_token(text: &str, token: &str) -> bool {
    !token.is_empty() && token_matches(text, token).next().is_some()
}

/// Byte offsets of `token` in `text` that do not run into a neighbouring
/// word, so `@name` never matches the front of `@namebot`.
fn token_matches<'a>(text: &'a str, token: &'a str) -> impl Iterator<Item = usize> + 'a {
    text.match_indices(token).map(|(start, _)| start).filter(move |&start| {
        let before = text[..start].chars().next_back();
        let after = text[start + token.len()..].chars().next();
        !joins(token.chars().next(), before) && !joins(token.chars().next_back(), after)
    })
}

fn joins(edge: Option<char>, neighbour: Option<char>) -> bool {
    let word = |c: char| c.is_alphanumeric() || c == '_';
    matches!((edge, neighbour), (Some(e), Some(n)) if word(e) && word(n))
}

/// Resolve persona text; a missing or empty file falls back to [`DEFAULT_PERSONA`].
pub fn load_persona(source: &PersonaSource) -> String {
    match source {
        PersonaSource::Inline(text) => text.trim().to_string(),
        PersonaSource::File(path) => match fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => {
                debug!(path = %path.display(), "persona loaded");
                text.trim().to_string()
            }
            Ok(_) => {
                warn!(path = %path.display(), "persona file is empty; using built-in persona");
                DEFAULT_PERSONA.to_string()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "persona file unreadable; using built-in persona");
                DEFAULT_PERSONA.to_string()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn persona_then_cleaned_user_turn_then_cue() {
        let b = PromptBuilder::new("You are Juan.");
        let p = b.build("<@123> how are you", "<@123>");
        assert_eq!(p.as_str(), "You are Juan.\n\nUser: how are you\nAssistant:");
        assert!(!p.as_str().contains("<@123>"));
    }

    #[test]
    fn every_occurrence_is_stripped() {
        let p = PromptBuilder::new("P").build("<@1> hi <@1> there <@1>", "<@1>");
        assert!(!p.as_str().contains("<@1>"));
        assert!(p.as_str().contains("User: hi  there"));
    }

    #[test]
    fn longer_handle_sharing_a_prefix_is_kept() {
        assert_eq!(strip_token("@namebot and @name hi", "@name"), "@namebot and  hi");
        assert_eq!(strip_token("@name_2 @name, hello @name", "@name"), "@name_2 , hello");
        let prompt = PromptBuilder::new("P").build("@name ask @namebot", "@name");
        assert_eq!(prompt.as_str(), "P\n\nUser: ask @namebot\nAssistant:");
    }

    #[test]
    fn strip_is_identity_without_token() {
        let text = "how are you";
        assert_eq!(strip_token(text, "<@123>"), text);
        assert_eq!(strip_token(&strip_token(text, "<@123>"), "<@123>"), text);
    }

    #[test]
    fn empty_token_strips_nothing() {
        assert_eq!(strip_token("  keep me  ", ""), "keep me");
    }

    #[test]
    fn empty_cleaned_text_is_still_a_prompt() {
        let p = PromptBuilder::new("P").build("<@9>", "<@9>");
        assert_eq!(p.as_str(), "P\n\nUser: \nAssistant:");
    }

    #[test]
    fn custom_labels_are_used() {
        let p = PromptBuilder::new("P").with_labels("Human", "Bot").build("x", "");
        assert_eq!(p.to_string(), "P\n\nHuman: x\nBot:");
    }

    #[test]
    fn build_is_deterministic() {
        let b = PromptBuilder::new("P");
        assert_eq!(b.build("a <@1>", "<@1>"), b.build("a <@1>", "<@1>"));
    }

    #[test]
    fn missing_persona_file_falls_back() {
        let src = PersonaSource::File(PathBuf::from("/nonexistent/persona.txt"));
        assert_eq!(load_persona(&src), DEFAULT_PERSONA);
    }

    #[test]
    fn persona_file_is_read_and_trimmed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("persona.txt");
        std::fs::write(&path, "\nYou are Juan.\n").unwrap();
        assert_eq!(load_persona(&PersonaSource::File(path)), "You are Juan.");
    }
}
