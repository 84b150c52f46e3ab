//! Classification of inbound chat text.
//!
//! Explicit commands use the configured prefix (`!ask`, `!ping`, `!help`).
//! A whole-word mention of the bot anywhere in a message counts as `ask`
//! with the whole text; the prompt builder strips the mention later.

use super::prompt::contains_token;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Addressed to the bot; carries the text to forward.
    Ask(String),
    /// `ask` with nothing to ask.
    AskUsage,
    Ping,
    Help,
}

/// Classify `text`. `None` means ordinary traffic.
pub fn parse(text: &str, prefix: &str, mention_token: &str) -> Option<Command> {
    let trimmed = text.trim();

    if !prefix.is_empty() {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            let (name, args) = match rest.split_once(char::is_whitespace) {
                Some((name, args)) => (name, args.trim()),
                None => (rest, ""),
            };
            match name.to_ascii_lowercase().as_str() {
                "ask" if args.is_empty() => return Some(Command::AskUsage),
                "ask" => return Some(Command::Ask(args.to_string())),
                "ping" => return Some(Command::Ping),
                "help" => return Some(Command::Help),
                _ => {}
            }
        }
    }

    if contains_token(trimmed, mention_token) {
        return Some(Command::Ask(trimmed.to_string()));
    }

    None
}

pub fn help_text(prefix: &str) -> String {
    format!(
        "Commands:\n\
         {prefix}ask <question>  Ask the AI something\n\
         {prefix}ping            Check that the bot is alive\n\
         {prefix}help            Show this message\n\
         You can also mention me with your question."
    )
}

pub fn ask_usage(prefix: &str) -> String {
    format!("Usage: {prefix}ask <question>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_command_carries_question() {
        assert_eq!(
            parse("!ask what is rust?", "!", "<@1>"),
            Some(Command::Ask("what is rust?".into()))
        );
    }

    #[test]
    fn ask_without_question_is_usage() {
        assert_eq!(parse("!ask", "!", "<@1>"), Some(Command::AskUsage));
        assert_eq!(parse("!ask    ", "!", "<@1>"), Some(Command::AskUsage));
    }

    #[test]
    fn command_names_are_case_insensitive() {
        assert_eq!(parse("!PING", "!", ""), Some(Command::Ping));
        assert_eq!(parse("!Help", "!", ""), Some(Command::Help));
    }

    #[test]
    fn mention_is_an_ask_with_full_text() {
        assert_eq!(
            parse("hey <@123> how are you", "!", "<@123>"),
            Some(Command::Ask("hey <@123> how are you".into()))
        );
    }

    #[test]
    fn handle_that_only_shares_a_prefix_is_not_a_mention() {
        assert_eq!(parse("ask @namebot instead", "!", "@name"), None);
        assert_eq!(
            parse("@name, and @namebot", "!", "@name"),
            Some(Command::Ask("@name, and @namebot".into()))
        );
    }

    #[test]
    fn ordinary_traffic_is_ignored() {
        assert_eq!(parse("just chatting", "!", "<@123>"), None);
        assert_eq!(parse("!unknown thing", "!", "<@123>"), None);
        assert_eq!(parse("", "!", "<@123>"), None);
    }

    #[test]
    fn empty_mention_token_never_matches() {
        assert_eq!(parse("anything", "!", ""), None);
    }

    #[test]
    fn help_lists_commands_with_prefix() {
        let text = help_text("?");
        assert!(text.contains("?ask"));
        assert!(text.contains("?ping"));
        assert_eq!(ask_usage("?"), "Usage: ?ask <question>");
    }
}
