//! Notification collaborator contract.

use crate::errors::CollaboratorError;
use crate::links;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A link button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Button label.
    pub label: String,
    /// Target, possibly narrative text that contains a URL.
    pub target: String,
    /// Whether the button is the highlighted one.
    pub primary: bool,
}

/// A resolved link button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAction {
    /// Button label.
    pub label: String,
    /// Valid `http(s)` URL.
    pub url: String,
    /// Whether the button is the highlighted one.
    pub primary: bool,
}

/// A completion message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Header line.
    pub header: String,
    /// Label and value pairs.
    pub fields: Vec<(String, String)>,
    /// Summary paragraph.
    pub summary: String,
    /// Candidate link buttons.
    pub actions: Vec<NotificationAction>,
    /// Footer line.
    pub footer: String,
}

impl NotificationMessage {
    /// Creates a message with a header.
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((label.into(), value.into()));
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Adds a link button.
    #[must_use]
    pub fn action(mut self, label: impl Into<String>, target: impl Into<String>, primary: bool) -> Self {
        self.actions.push(NotificationAction {
            label: label.into(),
            target: target.into(),
            primary,
        });
        self
    }

    /// Sets the footer.
    #[must_use]
    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    /// Returns the actions whose target resolves to a valid URL.
    ///
    /// Missing or non-`http(s)` targets are dropped; narrative targets are
    /// searched for an embedded URL first.
    #[must_use]
    pub fn resolved_actions(&self) -> Vec<ResolvedAction> {
        self.actions
            .iter()
            .filter_map(|a| {
                links::resolve_link(&a.target).map(|url| ResolvedAction {
                    label: a.label.clone(),
                    url,
                    primary: a.primary,
                })
            })
            .collect()
    }
}

/// Delivery confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    /// Where the message went.
    pub channel: String,
    /// Message timestamp, when the service returns one.
    pub timestamp: Option<String>,
}

/// A chat notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns false when no channel is configured.
    fn is_available(&self) -> bool {
        true
    }

    /// Posts a message.
    async fn post(&self, message: &NotificationMessage)
        -> Result<NotificationReceipt, CollaboratorError>;
}

/// Stand-in used when no channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableNotifier;

#[async_trait]
impl Notifier for UnavailableNotifier {
    fn is_available(&self) -> bool {
        false
    }

    async fn post(
        &self,
        _message: &NotificationMessage,
    ) -> Result<NotificationReceipt, CollaboratorError> {
        Err(CollaboratorError::Unavailable("notifier".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invalid_links_are_dropped() {
        let message = NotificationMessage::new("Done")
            .action("Review Pull Request", "", true)
            .action("View Documentation", "ftp://wiki.test/x", false);
        assert!(message.resolved_actions().is_empty());
    }

    #[test]
    fn test_placeholder_targets_are_dropped() {
        let message = NotificationMessage::new("Done")
            .action("Review Pull Request", "https://<PR_URL>", true)
            .action("View Documentation", "https://{confluence_url}", false)
            .action("Folder", "https://wiki.test/pages/1", false);
        let actions = message.resolved_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].label, "Folder");
    }

    #[test]
    fn test_narrative_link_is_extracted() {
        let message = NotificationMessage::new("Done")
            .action("Review Pull Request", "https://git.test/pull/1", true)
            .action("View Documentation", "Created [View Page](https://wiki.test/p)", false);
        let actions = message.resolved_actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].url, "https://wiki.test/p");
        assert!(actions[0].primary);
    }

    #[tokio::test]
    async fn test_unavailable_notifier() {
        let err = UnavailableNotifier
            .post(&NotificationMessage::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unavailable");
    }
}
