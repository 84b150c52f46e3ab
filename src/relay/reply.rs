//! Reply shaping for the delivery channel's length ceiling.

/// Reply text after truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedReply {
    pub text: String,
    pub truncated: bool,
}

/// Cut `text` to at most `ceiling` characters, appending `marker` when cut.
///
/// Counts characters, not bytes; a code point is never split.
pub fn truncate(text: &str, ceiling: usize, marker: &str) -> ShapedReply {
    match text.char_indices().nth(ceiling) {
        None => ShapedReply { text: text.to_string(), truncated: false },
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + marker.len());
            out.push_str(&text[..cut]);
            out.push_str(marker);
            ShapedReply { text: out, truncated: true }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "\n\n...[truncated]";

    #[test]
    fn short_text_is_unchanged() {
        let r = truncate("hello", 1900, MARKER);
        assert_eq!(r, ShapedReply { text: "hello".into(), truncated: false });
    }

    #[test]
    fn text_at_ceiling_is_unchanged() {
        let text = "a".repeat(1900);
        let r = truncate(&text, 1900, MARKER);
        assert!(!r.truncated);
        assert_eq!(r.text, text);
    }

    #[test]
    fn long_text_is_cut_with_marker() {
        let text = "x".repeat(2500);
        let r = truncate(&text, 1900, MARKER);
        assert!(r.truncated);
        assert_eq!(r.text.chars().count(), 1900 + MARKER.chars().count());
        assert!(r.text.starts_with(&"x".repeat(1900)));
        assert!(r.text.ends_with(MARKER));
    }

    #[test]
    fn multibyte_characters_are_counted_as_one() {
        let text = "é".repeat(10);
        let r = truncate(&text, 4, "…");
        assert_eq!(r.text, "éééé…");
    }

    #[test]
    fn empty_text() {
        assert_eq!(truncate("", 10, MARKER).text, "");
    }
}
