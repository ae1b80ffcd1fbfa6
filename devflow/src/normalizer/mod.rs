//! Response normalizer.
//!
//! Turns raw model output into a structured value the caller can rely on.
//! [`normalize`] is total: it tries, in order,
//!
//! 1. a direct JSON decode of the trimmed text,
//! 2. a decode of the interior of a leading code fence,
//! 3. a decode of the first brace-balanced `{...}` region,
//!
//! and otherwise returns the fallback payload for the requested
//! [`ResponseKind`]. [`normalize_as`] adds the per-kind shape check, so a
//! value that decodes but has the wrong shape also ends in the fallback.

mod extract;
mod unescape;

pub use extract::{balanced_object, strip_fence};
pub use unescape::{unescape_content, unescape_documentation};

use crate::contracts::{decode_shape, fallback_value, ResponseKind, ResponseShape};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Which strategy produced a normalized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseSource {
    /// The whole text was valid JSON.
    Direct,
    /// The text was a fenced code block around valid JSON.
    Fenced,
    /// A balanced object was cut out of surrounding prose.
    Extracted,
    /// Nothing usable was found; the typed fallback was substituted.
    Fallback,
}

impl fmt::Display for ParseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Fenced => write!(f, "fenced"),
            Self::Extracted => write!(f, "extracted"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A normalized value together with the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    /// The value.
    pub value: T,
    /// How it was obtained.
    pub source: ParseSource,
}

impl<T> Normalized<T> {
    /// Returns true if the value is the synthetic fallback.
    pub fn is_fallback(&self) -> bool {
        self.source == ParseSource::Fallback
    }
}

/// Runs the parse strategies without a fallback.
pub fn parse_structured(raw: &str) -> Option<(Value, ParseSource)> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some((value, ParseSource::Direct));
    }

    let unfenced = strip_fence(trimmed);
    if let Some(ref interior) = unfenced {
        if let Ok(value) = serde_json::from_str::<Value>(interior) {
            return Some((value, ParseSource::Fenced));
        }
    }

    let body = unfenced.as_deref().unwrap_or(trimmed);
    balanced_object(body)
        .and_then(|region| serde_json::from_str::<Value>(region).ok())
        .map(|value| (value, ParseSource::Extracted))
}

/// Normalizes raw text and reports the strategy used.
pub fn normalize_traced(raw: &str, kind: ResponseKind) -> Normalized<Value> {
    if let Some((value, source)) = parse_structured(raw) {
        debug!(kind = %kind, source = %source, "Normalized model response");
        return Normalized { value, source };
    }
    warn!(kind = %kind, length = raw.len(), "Model response unparseable, using fallback");
    Normalized {
        value: fallback_value(kind),
        source: ParseSource::Fallback,
    }
}

/// Normalizes raw text into a JSON value. Never fails.
pub fn normalize(raw: &str, kind: ResponseKind) -> Value {
    normalize_traced(raw, kind).value
}

/// Normalizes raw text straight into a typed response.
///
/// Decoded values that fail the shape check are replaced by `T::fallback()`.
/// The result is post-processed either way.
pub fn normalize_as<T: ResponseShape>(raw: &str) -> Normalized<T> {
    let parsed = normalize_traced(raw, T::KIND);
    let (mut value, source) = if parsed.is_fallback() {
        (T::fallback(), ParseSource::Fallback)
    } else {
        match decode_shape::<T>(parsed.value) {
            Ok(typed) => (typed, parsed.source),
            Err(e) => {
                warn!(kind = %T::KIND, error = %e, "Model response has the wrong shape, using fallback");
                (T::fallback(), ParseSource::Fallback)
            }
        }
    };
    value.post_process();
    Normalized { value, source }
}
