//! Knowledge lookup used to enrich prompts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One knowledge base hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    /// Entry text.
    pub content: String,
    /// Similarity to the query, in `[0, 1]`.
    pub relevance: f64,
}

/// A source of reference snippets.
///
/// Results are ordered by descending relevance. An empty list is a valid
/// answer; callers do not treat it as an error.
#[cfg_attr(test, mockall::automock)]
pub trait KnowledgeBase: Send + Sync {
    /// Returns up to `top_k` entries relevant to `text`.
    fn query(&self, text: &str, top_k: usize) -> Vec<KnowledgeHit>;
}

const LINUX_TO_WINDOWS: [&str; 6] = [
    "Linux open() system call maps to Windows CreateFile(). Use GENERIC_READ or \
     GENERIC_WRITE for access and CREATE_ALWAYS or OPEN_EXISTING for disposition.",
    "Linux read() system call maps to Windows ReadFile(). ReadFile takes a handle, \
     a buffer, the byte count and receives the number of bytes read.",
    "Linux write() system call maps to Windows WriteFile(). WriteFile takes a handle, \
     a buffer, the byte count and receives the number of bytes written.",
    "Linux close() system call maps to Windows CloseHandle(). Every handle returned by \
     CreateFile or CreateProcess must be closed.",
    "Linux fork() has no direct Windows equivalent. Use CreateProcess() to start a new \
     process with its own command line.",
    "Linux pthread_create() maps to Windows CreateThread(). Wait for completion with \
     WaitForSingleObject and close the thread handle.",
];

/// In-process knowledge base scored by term-count cosine similarity.
#[derive(Debug, Clone)]
pub struct InMemoryKnowledgeBase {
    entries: Vec<(String, HashMap<String, usize>)>,
}

impl InMemoryKnowledgeBase {
    /// Creates an empty knowledge base.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates a knowledge base seeded with Linux to Windows API mappings.
    #[must_use]
    pub fn with_conversion_entries() -> Self {
        LINUX_TO_WINDOWS
            .iter()
            .fold(Self::new(), |kb, entry| kb.with_entry(*entry))
    }

    /// Adds an entry.
    #[must_use]
    pub fn with_entry(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        let terms = term_counts(&content);
        self.entries.push((content, terms));
        self
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryKnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBase for InMemoryKnowledgeBase {
    fn query(&self, text: &str, top_k: usize) -> Vec<KnowledgeHit> {
        let query = term_counts(text);
        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, terms))| (i, cosine(&query, terms)))
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(top_k)
            .map(|(i, relevance)| KnowledgeHit {
                content: self.entries[i].0.clone(),
                relevance,
            })
            .collect()
    }
}

/// Knowledge base with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyKnowledgeBase;

impl KnowledgeBase for EmptyKnowledgeBase {
    fn query(&self, _text: &str, _top_k: usize) -> Vec<KnowledgeHit> {
        Vec::new()
    }
}

fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
    {
        *counts.entry(word.to_lowercase()).or_insert(0) += 1;
    }
    counts
}

#[allow(clippy::cast_precision_loss)]
fn cosine(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
    let dot: usize = a
        .iter()
        .filter_map(|(term, n)| b.get(term).map(|m| n * m))
        .sum();
    if dot == 0 {
        return 0.0;
    }
    let norm = |m: &HashMap<String, usize>| {
        (m.values().map(|n| n * n).sum::<usize>() as f64).sqrt()
    };
    dot as f64 / (norm(a) * norm(b))
}
