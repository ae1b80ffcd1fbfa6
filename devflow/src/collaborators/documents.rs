//! Document store collaborator contract.

use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a page is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// A container page listing its children.
    Folder,
    /// A regular document page.
    #[default]
    Document,
}

/// A page to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page title, unique within the space.
    pub title: String,
    /// Page body as markdown.
    pub body_markdown: String,
    /// Parent page, if the page belongs under one.
    pub parent_id: Option<String>,
    /// Rendering kind.
    pub kind: PageKind,
}

impl PageRequest {
    /// Creates a document page request.
    #[must_use]
    pub fn document(title: impl Into<String>, body_markdown: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body_markdown: body_markdown.into(),
            parent_id: None,
            kind: PageKind::Document,
        }
    }

    /// Creates a folder page request.
    #[must_use]
    pub fn folder(title: impl Into<String>, body_markdown: impl Into<String>) -> Self {
        Self {
            kind: PageKind::Folder,
            ..Self::document(title, body_markdown)
        }
    }

    /// Places the page under a parent. Blank ids are ignored.
    #[must_use]
    pub fn with_parent(mut self, parent_id: Option<impl Into<String>>) -> Self {
        self.parent_id = parent_id.map(Into::into).filter(|id: &String| !id.trim().is_empty());
        self
    }
}

/// A published page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    /// Page id.
    pub id: String,
    /// Browser URL.
    pub url: String,
    /// Page title.
    pub title: String,
}

/// A wiki-style document store.
///
/// `publish_page` follows one algorithm: with a parent id, create a child page
/// under it; without one, look the title up in the space and either update
/// that page (version + 1) or create a top-level page.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns false when the store is not configured.
    fn is_available(&self) -> bool {
        true
    }

    /// Publishes a page.
    async fn publish_page(&self, request: &PageRequest) -> Result<PageRef, CollaboratorError>;
}

/// Stand-in used when the store is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDocumentStore;

#[async_trait]
impl DocumentStore for UnavailableDocumentStore {
    fn is_available(&self) -> bool {
        false
    }

    async fn publish_page(&self, _request: &PageRequest) -> Result<PageRef, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "document store".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_parent_is_ignored() {
        let request = PageRequest::document("t", "b").with_parent(Some("  "));
        assert_eq!(request.parent_id, None);
        let request = PageRequest::folder("t", "b").with_parent(Some("42"));
        assert_eq!(request.parent_id.as_deref(), Some("42"));
        assert_eq!(request.kind, PageKind::Folder);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = UnavailableDocumentStore;
        assert!(!store.is_available());
        let err = store
            .publish_page(&PageRequest::document("t", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unavailable");
    }
}
