//! Slack delivery through the Web API or an incoming webhook.

use super::notify::{NotificationMessage, NotificationReceipt, Notifier};
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// How messages reach Slack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackDelivery {
    /// `chat.postMessage` with a bot token.
    Bot {
        /// Bot token.
        token: String,
        /// Channel id.
        channel: String,
    },
    /// Incoming webhook.
    Webhook {
        /// Webhook URL.
        url: String,
    },
}

/// [`Notifier`] for Slack.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    http: reqwest::Client,
    delivery: SlackDelivery,
    api_base: String,
}

impl SlackNotifier {
    /// Creates the notifier.
    #[must_use]
    pub fn new(delivery: SlackDelivery) -> Self {
        Self {
            http: reqwest::Client::new(),
            delivery,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Overrides the Web API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn post_bot(
        &self,
        token: &str,
        channel: &str,
        message: &NotificationMessage,
    ) -> Result<NotificationReceipt, CollaboratorError> {
        let url = format!("{}/chat.postMessage", self.api_base.trim_end_matches('/'));
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({
                "channel": channel,
                "text": message.header,
                "blocks": blocks(message),
            }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let result: Value = resp.json().await?;
        if result.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body: error.to_string(),
            });
        }
        Ok(NotificationReceipt {
            channel: channel.to_string(),
            timestamp: result.get("ts").and_then(Value::as_str).map(str::to_string),
        })
    }

    async fn post_webhook(
        &self,
        url: &str,
        message: &NotificationMessage,
    ) -> Result<NotificationReceipt, CollaboratorError> {
        let resp = self
            .http
            .post(url)
            .json(&json!({"text": message.header, "blocks": blocks(message)}))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(NotificationReceipt {
            channel: "webhook".to_string(),
            timestamp: None,
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post(
        &self,
        message: &NotificationMessage,
    ) -> Result<NotificationReceipt, CollaboratorError> {
        let receipt = match &self.delivery {
            SlackDelivery::Bot { token, channel } => self.post_bot(token, channel, message).await?,
            SlackDelivery::Webhook { url } => self.post_webhook(url, message).await?,
        };
        info!(channel = %receipt.channel, "Notification sent");
        Ok(receipt)
    }
}

/// Renders a message as Block Kit blocks.
///
/// The actions block appears only when at least one link resolves.
#[must_use]
pub fn blocks(message: &NotificationMessage) -> Vec<Value> {
    let mut blocks = vec![json!({
        "type": "header",
        "text": {"type": "plain_text", "text": message.header},
    })];

    if !message.fields.is_empty() {
        let fields: Vec<Value> = message
            .fields
            .iter()
            .map(|(label, value)| json!({"type": "mrkdwn", "text": format!("*{label}:*\n{value}")}))
            .collect();
        blocks.push(json!({"type": "section", "fields": fields}));
    }

    if !message.summary.is_empty() {
        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("*Summary:*\n{}", message.summary)},
        }));
    }

    let buttons: Vec<Value> = message
        .resolved_actions()
        .into_iter()
        .map(|action| {
            let mut button = json!({
                "type": "button",
                "text": {"type": "plain_text", "text": action.label},
                "url": action.url,
            });
            if action.primary {
                button["style"] = json!("primary");
            }
            button
        })
        .collect();
    if !buttons.is_empty() {
        blocks.push(json!({"type": "actions", "elements": buttons}));
    }

    if !message.footer.is_empty() {
        blocks.push(json!({
            "type": "context",
            "elements": [{"type": "mrkdwn", "text": message.footer}],
        }));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> NotificationMessage {
        NotificationMessage::new("AI Employee Completed: Port")
            .field("Project", "Port")
            .summary("2 files")
            .action("Review Pull Request", "https://git.test/pull/1", true)
            .action("View Documentation", "", false)
            .footer("Generated by devflow")
    }

    fn block_types(blocks: &[Value]) -> Vec<&str> {
        blocks.iter().filter_map(|b| b["type"].as_str()).collect()
    }

    #[test]
    fn test_blocks_layout() {
        let rendered = blocks(&message());
        assert_eq!(
            block_types(&rendered),
            vec!["header", "section", "section", "actions", "context"]
        );
        let elements = rendered[3]["elements"].as_array().unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0]["style"], "primary");
    }

    #[test]
    fn test_actions_block_dropped_without_links() {
        let message = NotificationMessage::new("x").action("Review Pull Request", "n/a", true);
        assert_eq!(block_types(&blocks(&message)), vec!["header"]);
    }

    #[tokio::test]
    async fn test_bot_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(json!({"channel": "C123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "1.2"})))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(SlackDelivery::Bot {
            token: "xoxb-test".into(),
            channel: "C123".into(),
        })
        .with_api_base(server.uri());
        let receipt = notifier.post(&message()).await.unwrap();
        assert_eq!(receipt.channel, "C123");
        assert_eq!(receipt.timestamp.as_deref(), Some("1.2"));
    }

    #[tokio::test]
    async fn test_bot_not_ok_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(SlackDelivery::Bot {
            token: "t".into(),
            channel: "C0".into(),
        })
        .with_api_base(server.uri());
        let err = notifier.post(&message()).await.unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[tokio::test]
    async fn test_webhook_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(SlackDelivery::Webhook {
            url: format!("{}/hooks/abc", server.uri()),
        });
        let receipt = notifier.post(&message()).await.unwrap();
        assert_eq!(receipt.channel, "webhook");
    }
}
