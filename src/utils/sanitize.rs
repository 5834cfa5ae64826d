// Sanitization utilities

/// Sanitize HTML content using ammonia before it leaves for a publishing target
pub fn sanitize_html(text: &str) -> String {
    ammonia::clean(text)
}

/// Truncate text to a maximum number of characters
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_html() {
        assert!(!sanitize_html("<script>alert('xss')</script>").contains("script"));

        let safe_html = "<p>Hello <strong>world</strong></p>";
        let sanitized = sanitize_html(safe_html);
        assert!(sanitized.contains("<p>"));
        assert!(sanitized.contains("<strong>"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }
}
