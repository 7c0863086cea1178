// Text Processing Helpers
// Char-safe truncation and previews shared by the pipeline, enrichment and CLI

/// First `max_chars` characters of `text`, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Single-line preview for terminal output.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out = truncate_chars(text, max_chars).to_string();
    if out.len() < text.len() {
        out.push_str("...");
    }
    out.replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("हिंदी contract", 3), "हिं");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 5), "");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_preview_marks_truncation() {
        assert_eq!(preview("line one\nline two", 8), "line one...");
        assert_eq!(preview("a\nb", 10), "a b");
    }
}
