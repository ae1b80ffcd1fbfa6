//! Text-level recovery of a JSON payload.

/// Returns the interior of a fenced code block.
///
/// The opening line (the backtick fence plus any language tag) is dropped, and
/// so is the last line when it is a bare closing fence. Returns `None` when the
/// text does not start with a fence.
pub fn strip_fence(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return None;
    }

    let mut lines: Vec<&str> = trimmed.lines().skip(1).collect();
    if lines.last().is_some_and(|line| line.trim() == "```") {
        lines.pop();
    }
    Some(lines.join("\n").trim().to_string())
}

/// Returns the first brace-balanced `{...}` region of `text`.
///
/// Braces inside double-quoted strings are ignored; inside a string a
/// backslash escapes the next character. Returns `None` when there is no
/// opening brace or the region never closes.
pub fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_with_language_tag() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_fence(text).as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_strip_fence_without_closing_line() {
        let text = "```\n{\"a\": 1}";
        assert_eq!(strip_fence(text).as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_strip_fence_requires_leading_fence() {
        assert!(strip_fence("{\"a\": 1}").is_none());
        assert!(strip_fence("text\n```json\n{}\n```").is_none());
    }

    #[test]
    fn test_balanced_object_ignores_prose() {
        let text = "Here is the result:\n{\"a\": 1}\nThanks";
        assert_eq!(balanced_object(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_balanced_object_nested() {
        let text = "x {\"a\": {\"b\": {}}} y {\"c\": 2}";
        assert_eq!(balanced_object(text), Some("{\"a\": {\"b\": {}}}"));
    }

    #[test]
    fn test_braces_inside_strings_are_opaque() {
        let text = r#"note {"code": "int main() { return 0; }", "n": 1} done"#;
        assert_eq!(
            balanced_object(text),
            Some(r#"{"code": "int main() { return 0; }", "n": 1}"#)
        );
    }

    #[test]
    fn test_escaped_quote_does_not_end_string() {
        let text = r#"{"s": "say \"}\" twice"} trailing"#;
        assert_eq!(balanced_object(text), Some(r#"{"s": "say \"}\" twice"}"#));
    }

    #[test]
    fn test_unbalanced_returns_none() {
        assert!(balanced_object("{\"a\": {\"b\": 1}").is_none());
        assert!(balanced_object("no braces here").is_none());
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "résumé → {\"name\": \"café\"} ✓";
        assert_eq!(balanced_object(text), Some("{\"name\": \"café\"}"));
    }
}
