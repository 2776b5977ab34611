/// Removes a surrounding Markdown code fence, as models often wrap JSON in one.
pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

/// Folds curly punctuation and a few common mojibake sequences to ASCII.
pub fn sanitize(text: &str) -> String {
    const REPLACEMENTS: [(&str, &str); 10] = [
        ("\u{FFFD}?T", "'"),
        ("\u{FFFD}?o", "\""),
        ("\u{FFFD}??", "\""),
        ("\u{FFFD}?\"", "-"),
        ("\u{2019}", "'"),
        ("\u{2018}", "'"),
        ("\u{201C}", "\""),
        ("\u{201D}", "\""),
        ("\u{2014}", "-"),
        ("\u{2026}", "..."),
    ];
    REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  ```json  \n  {}  \n  ```  "), "{}");
    }

    #[test]
    fn test_sanitize_curly_punctuation() {
        assert_eq!(
            sanitize("The station\u{2019}s \u{201C}night\u{201D} cycle\u{2014}failed\u{2026}"),
            "The station's \"night\" cycle-failed..."
        );
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("a longer sentence", 8), "a longer...");
    }
}
