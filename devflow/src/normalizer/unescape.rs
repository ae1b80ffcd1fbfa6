//! Escape-sequence cleanup for documentation prose.

/// Replaces the literal sequences `\n`, `\t`, `\"` and `\\`.
///
/// This is plain substitution, applied in that order. The content is prose, so
/// it is never decoded as JSON a second time.
#[must_use]
pub fn unescape_content(content: &str) -> String {
    content
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

/// Unescapes documentation content when it contains a literal `\n`.
///
/// Content without one is returned unchanged.
pub fn unescape_documentation(content: &str) -> String {
    if content.contains("\\n") {
        unescape_content(content)
    } else {
        content.to_string()
    }
}
