//! Completion notification.

use super::common::{self, file_records, non_empty_str, ProjectInfo};
use super::{
    Stage, CONFLUENCE_FOLDER, DOCUMENTATION, IMPLEMENTATION, NOTIFICATION, PULL_REQUEST, TESTS,
};
use crate::collaborators::{Collaborators, NotificationMessage};
use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Posts a summary of the run with links to the pull request and documentation.
#[derive(Debug, Clone)]
pub struct NotificationStage {
    collaborators: Collaborators,
}

impl NotificationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Builds the message from earlier results.
    #[must_use]
    pub fn message(ctx: &StageContext) -> NotificationMessage {
        let info = ProjectInfo::from_context(ctx);
        let implementation = file_records(&ctx.prior(IMPLEMENTATION), "files_created").len();
        let tests = file_records(&ctx.prior(TESTS), "test_files").len();
        let transcript = ctx
            .transcript_path()
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());

        let pull_request = ctx.prior(PULL_REQUEST);
        let folder = ctx.prior(CONFLUENCE_FOLDER);
        let documentation = ctx.prior(DOCUMENTATION);
        let docs_link = non_empty_str(&folder, "folder_url")
            .or_else(|| non_empty_str(&documentation, "confluence_page_url"))
            .unwrap_or_default();

        NotificationMessage::new(format!("AI Employee Completed: {}", info.project_name))
            .field("Project", &info.project_name)
            .field("Transcript", transcript)
            .field("Completed", ctx.identity().display_time())
            .summary(format!(
                "Successfully generated {implementation} implementation files and {tests} test files."
            ))
            .action(
                "Review Pull Request",
                non_empty_str(&pull_request, "pr_url").unwrap_or_default(),
                true,
            )
            .action("View Documentation", docs_link, false)
            .footer("Generated by devflow")
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, CollaboratorError> {
        let message = Self::message(ctx);
        let receipt = self.collaborators.notifier.post(&message).await?;
        info!(channel = %receipt.channel, "Sent completion notification");
        Ok(StageResult::success(json!({
            "channel": receipt.channel,
            "timestamp": receipt.timestamp,
        })))
    }
}

#[async_trait]
impl Stage for NotificationStage {
    fn name(&self) -> &str {
        NOTIFICATION
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        match self.run(ctx).await {
            Ok(result) => result,
            Err(e) => common::failure(NOTIFICATION, "send notification", &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::TRANSCRIPT;
    use crate::testing::{fake_collaborators, stage_context};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_message_contents() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        let ctx = stage_context(
            &dir.path().join("meeting.txt"),
            dir.path(),
            &[
                (TRANSCRIPT, json!({"project_name": "Port"})),
                (PULL_REQUEST, json!({"pr_url": "https://git.test/acme/metrics/pull/4"})),
                (
                    DOCUMENTATION,
                    json!({"confluence_page_url": "Created [View Page](https://wiki.test/d)"}),
                ),
                (IMPLEMENTATION, json!({"files_created": [{"path": "a.c"}, {"path": "b.c"}]})),
            ],
        );

        let result = NotificationStage::new(collaborators).execute(&ctx).await;
        assert!(result.is_success());
        assert_eq!(result.get_str("channel"), "#test");

        let sent = fakes.notifier.sent();
        let message = &sent[0];
        assert_eq!(message.header, "AI Employee Completed: Port");
        assert_eq!(message.fields[1], ("Transcript".to_string(), "meeting.txt".to_string()));
        assert_eq!(
            message.summary,
            "Successfully generated 2 implementation files and 0 test files."
        );
        let actions = message.resolved_actions();
        assert_eq!(actions[0].url, "https://git.test/acme/metrics/pull/4");
        assert_eq!(actions[1].url, "https://wiki.test/d");
    }

    #[tokio::test]
    async fn test_folder_url_preferred_for_docs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = stage_context(
            &dir.path().join("t.txt"),
            dir.path(),
            &[
                (CONFLUENCE_FOLDER, json!({"folder_url": "https://wiki.test/folder"})),
                (DOCUMENTATION, json!({"confluence_page_url": "https://wiki.test/d"})),
            ],
        );
        let message = NotificationStage::message(&ctx);
        let actions = message.resolved_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].label, "View Documentation");
        assert_eq!(actions[0].url, "https://wiki.test/folder");
    }

    #[tokio::test]
    async fn test_delivery_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.notifier.fail_with("channel_not_found");
        let ctx = stage_context(&dir.path().join("t.txt"), dir.path(), &[]);

        let result = NotificationStage::new(collaborators).execute(&ctx).await;
        assert!(result.is_failure());
        assert_eq!(result.get_str("error_code"), "api");
    }
}
