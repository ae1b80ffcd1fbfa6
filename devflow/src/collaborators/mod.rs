//! External collaborators reached through narrow contracts.
//!
//! Each contract is a trait with a real adapter and an explicit unavailable
//! variant. [`Collaborators::from_settings`] picks one or the other depending
//! on which credentials are present.

mod confluence;
mod documents;
mod git;
mod knowledge;
mod llm;
mod notify;
mod slack;
mod source_control;

pub use confluence::{markdown_to_storage, ConfluenceConfig, ConfluenceStore};
pub use documents::{DocumentStore, PageKind, PageRef, PageRequest, UnavailableDocumentStore};
pub use git::{authenticated_url, GitConfig, GitSourceControl, RepoCoordinates, CHECKOUT_DIR};
pub use knowledge::{EmptyKnowledgeBase, InMemoryKnowledgeBase, KnowledgeBase, KnowledgeHit};
pub use llm::{
    ChatMessage, ChatModelConfig, ChatRole, LanguageModel, OpenAiChatModel, UnavailableModel,
};
pub use notify::{
    NotificationAction, NotificationMessage, NotificationReceipt, Notifier, ResolvedAction,
    UnavailableNotifier,
};
pub use slack::{blocks as slack_blocks, SlackDelivery, SlackNotifier};
pub use source_control::{
    BranchInfo, ChangeRequest, ChangeRequestInfo, CloneInfo, CommitInfo, SourceControl,
    UnavailableSourceControl,
};

#[cfg(test)]
pub use knowledge::MockKnowledgeBase;

use crate::config::{EnvLookup, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The set of collaborators a run uses.
#[derive(Clone)]
pub struct Collaborators {
    /// Language model.
    pub model: Arc<dyn LanguageModel>,
    /// Knowledge lookup.
    pub knowledge: Arc<dyn KnowledgeBase>,
    /// Source control.
    pub source_control: Arc<dyn SourceControl>,
    /// Document store.
    pub documents: Arc<dyn DocumentStore>,
    /// Notifications.
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Creates a bundle from explicit parts.
    #[must_use]
    pub fn new(
        model: Arc<dyn LanguageModel>,
        knowledge: Arc<dyn KnowledgeBase>,
        source_control: Arc<dyn SourceControl>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            model,
            knowledge,
            source_control,
            documents,
            notifier,
        }
    }

    /// Builds the bundle from settings and an environment.
    ///
    /// Missing credentials produce unavailable variants; nothing here fails.
    #[must_use]
    pub fn from_settings(settings: &Settings, env: EnvLookup<'_>) -> Self {
        let collaborators = Self {
            model: build_model(settings, env),
            knowledge: Arc::new(InMemoryKnowledgeBase::with_conversion_entries()),
            source_control: build_source_control(settings, env),
            documents: build_documents(settings, env),
            notifier: build_notifier(settings, env),
        };
        info!(
            model = %collaborators.model.describe(),
            source_control = collaborators.source_control.is_available(),
            documents = collaborators.documents.is_available(),
            notifier = collaborators.notifier.is_available(),
            "Collaborators configured"
        );
        collaborators
    }

    /// Replaces the language model.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = model;
        self
    }

    /// Replaces the knowledge base.
    #[must_use]
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = knowledge;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("model", &self.model.describe())
            .field("source_control", &self.source_control.is_available())
            .field("documents", &self.documents.is_available())
            .field("notifier", &self.notifier.is_available())
            .finish_non_exhaustive()
    }
}

fn build_model(settings: &Settings, env: EnvLookup<'_>) -> Arc<dyn LanguageModel> {
    let llm = &settings.llm;
    let Some(api_key) = env(&llm.api_key_env) else {
        warn!(variable = %llm.api_key_env, "Model API key not set");
        return Arc::new(UnavailableModel::new(format!("{} not set", llm.api_key_env)));
    };
    let config = ChatModelConfig {
        base_url: llm.resolved_base_url(env),
        model: llm.resolved_model(env),
        api_key,
        temperature: llm.temperature,
        max_tokens: llm.max_tokens,
        timeout: Duration::from_secs(llm.timeout_secs),
        retry: llm.retry.clone(),
    };
    match OpenAiChatModel::new(config) {
        Ok(model) => Arc::new(model),
        Err(e) => {
            warn!(error = %e, "Model client could not be built");
            Arc::new(UnavailableModel::new(e.to_string()))
        }
    }
}

fn build_source_control(settings: &Settings, env: EnvLookup<'_>) -> Arc<dyn SourceControl> {
    let git = &settings.integrations.git;
    let Some(repo_url) = env(&git.repo_url_env) else {
        return Arc::new(UnavailableSourceControl::new(git.default_branch.clone()));
    };
    Arc::new(GitSourceControl::new(GitConfig {
        work_directory: PathBuf::from(&git.work_directory),
        default_branch: git.default_branch.clone(),
        repo_url: Some(repo_url),
        token: env(&git.token_env),
        api_base: None,
    }))
}

fn build_documents(settings: &Settings, env: EnvLookup<'_>) -> Arc<dyn DocumentStore> {
    let c = &settings.integrations.confluence;
    match (
        env(&c.base_url_env),
        env(&c.email_env),
        env(&c.token_env),
        env(&c.space_key_env),
    ) {
        (Some(base_url), Some(email), Some(api_token), Some(space_key)) => {
            Arc::new(ConfluenceStore::new(ConfluenceConfig {
                base_url,
                email,
                api_token,
                space_key,
            }))
        }
        _ => Arc::new(UnavailableDocumentStore),
    }
}

fn build_notifier(settings: &Settings, env: EnvLookup<'_>) -> Arc<dyn Notifier> {
    let s = &settings.integrations.slack;
    let delivery = match (env(&s.bot_token_env), env(&s.channel_env), env(&s.webhook_url_env)) {
        (Some(token), Some(channel), _) => SlackDelivery::Bot { token, channel },
        (_, _, Some(url)) => SlackDelivery::Webhook { url },
        _ => return Arc::new(UnavailableNotifier),
    };
    Arc::new(SlackNotifier::new(delivery))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn bundle(vars: &[(&str, &str)]) -> Collaborators {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let env = move |k: &str| vars.get(k).cloned();
        Collaborators::from_settings(&Settings::default(), &env)
    }

    #[test]
    fn test_empty_environment_is_all_unavailable() {
        let c = bundle(&[]);
        assert!(!c.model.is_available());
        assert!(!c.source_control.is_available());
        assert!(!c.documents.is_available());
        assert!(!c.notifier.is_available());
        assert!(!c.knowledge.query("open", 3).is_empty());
    }

    #[test]
    fn test_full_environment_is_available() {
        let c = bundle(&[
            ("OPENAI_API_KEY", "sk"),
            ("GITHUB_REPO_URL", "https://github.com/a/b"),
            ("CONFLUENCE_BASE_URL", "https://wiki.test"),
            ("CONFLUENCE_USER_EMAIL", "e@test"),
            ("CONFLUENCE_API_TOKEN", "t"),
            ("CONFLUENCE_SPACE_KEY", "ENG"),
            ("SLACK_WEBHOOK_URL", "https://hooks.test/x"),
        ]);
        assert!(c.model.is_available());
        assert!(c.source_control.is_available());
        assert_eq!(c.source_control.repository_url().as_deref(), Some("https://github.com/a/b"));
        assert!(c.documents.is_available());
        assert!(c.notifier.is_available());
    }

    #[test]
    fn test_partial_confluence_is_unavailable() {
        let c = bundle(&[("CONFLUENCE_BASE_URL", "https://wiki.test")]);
        assert!(!c.documents.is_available());
    }
}
