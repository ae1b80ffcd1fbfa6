//! URL extraction from narrative text.
//!
//! Collaborators return structured URLs and those are always preferred. This
//! module only recovers a link from free text, such as a tool answer that says
//! "Created page: [View Page](https://...)". Patterns are tried in order:
//!
//! 1. `[View Page](https://...)`
//! 2. any markdown link `[label](https://...)`
//! 3. a bare `https://` URL up to whitespace or a bracket, keeping one
//!    balanced parenthesised suffix
//!
//! Matching is case-insensitive. No match yields an empty string.

use regex::Regex;
use std::sync::OnceLock;
use url::{Host, Url};

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\[View Page\]\((https://[^\)]+)\)",
            r"(?i)\[[^\]]*?\]\((https://[^\)]+)\)",
            r"(?i)(https://[^\s\)\]\(]+(?:\([^\)]*\))?)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Extracts the first URL from narrative text, or `""`.
#[must_use]
pub fn extract_url(text: &str) -> String {
    patterns()
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
        .unwrap_or_default()
}

/// Returns true for an `http://` or `https://` URL with a real host.
///
/// Domain hosts are limited to letters, digits, `-` and `.`, which rejects
/// template placeholders such as `https://{page_url}`.
#[must_use]
pub fn is_valid_url(candidate: &str) -> bool {
    let Ok(url) = Url::parse(candidate.trim()) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => {
            !domain.is_empty()
                && domain
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        }
        Some(Host::Ipv4(_) | Host::Ipv6(_)) => true,
        None => false,
    }
}

/// Resolves a link candidate into a usable URL, or `None`.
///
/// A valid URL is returned as is. Anything else is searched for an embedded
/// URL.
#[must_use]
pub fn resolve_link(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    if is_valid_url(candidate) {
        return Some(candidate.to_string());
    }
    let extracted = extract_url(candidate);
    is_valid_url(&extracted).then_some(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_page_link_wins() {
        let text = "See [docs](https://a.test/x) or [View Page](https://wiki.test/page/1)";
        assert_eq!(extract_url(text), "https://wiki.test/page/1");
    }

    #[test]
    fn test_markdown_link() {
        assert_eq!(
            extract_url("Created: [Requirements](https://wiki.test/r)."),
            "https://wiki.test/r"
        );
    }

    #[test]
    fn test_bare_url_with_trailing_punctuation() {
        assert_eq!(
            extract_url("PR is at https://git.test/o/r/pull/3."),
            "https://git.test/o/r/pull/3"
        );
    }

    #[test]
    fn test_bare_url_keeps_balanced_suffix() {
        assert_eq!(
            extract_url("page https://wiki.test/Foo_(bar) here"),
            "https://wiki.test/Foo_(bar)"
        );
    }

    #[test]
    fn test_no_url_is_empty() {
        assert_eq!(extract_url("nothing to see"), "");
        assert_eq!(extract_url("http only: http://plain.test"), "");
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://example.test"));
        assert!(is_valid_url("http://localhost:8080/x"));
        assert!(!is_valid_url("ftp://example.test"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_placeholder_links_are_invalid() {
        for placeholder in [
            "https://<PR_URL>",
            "https://[link]",
            "https://{confluence_url}",
            "http://?",
        ] {
            assert!(!is_valid_url(placeholder), "{placeholder}");
            assert_eq!(resolve_link(placeholder), None, "{placeholder}");
        }
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(
            resolve_link("https://git.test/pull/1").as_deref(),
            Some("https://git.test/pull/1")
        );
        assert_eq!(
            resolve_link("Created [View Page](https://wiki.test/p)").as_deref(),
            Some("https://wiki.test/p")
        );
        assert_eq!(resolve_link(""), None);
        assert_eq!(resolve_link("not a link"), None);
    }
}
