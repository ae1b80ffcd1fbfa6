//! Workflow configuration.
//!
//! The YAML file names environment variables rather than carrying secrets.
//! Values are looked up when collaborators are built, through an [`EnvLookup`]
//! so tests can supply their own environment.

use crate::errors::ConfigError;
use crate::pipeline::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the config file.
pub const DEFAULT_CONFIG_PATH: &str = "config/agent_config.yaml";

/// Looks up an environment value by name.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Reads a variable from the process environment, ignoring blank values.
#[must_use]
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Language-model settings.
    pub llm: LlmSettings,
    /// Knowledge lookup settings.
    pub knowledge: KnowledgeSettings,
    /// External integrations.
    pub integrations: IntegrationSettings,
}

impl Settings {
    /// Loads settings from a YAML file.
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// read or parsed is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parses settings from YAML text. An empty document yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }
}

/// Language-model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of an OpenAI-compatible API. `OPENAI_BASE_URL` overrides it.
    pub base_url: String,
    /// Model name. `CHAT_MODEL` overrides it.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Retry policy for model calls.
    pub retry: RetryConfig,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmSettings {
    /// Base URL after applying the `OPENAI_BASE_URL` override.
    #[must_use]
    pub fn resolved_base_url(&self, env: EnvLookup<'_>) -> String {
        env("OPENAI_BASE_URL").unwrap_or_else(|| self.base_url.clone())
    }

    /// Model name after applying the `CHAT_MODEL` override.
    #[must_use]
    pub fn resolved_model(&self, env: EnvLookup<'_>) -> String {
        env("CHAT_MODEL").unwrap_or_else(|| self.model.clone())
    }
}

/// Knowledge lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    /// Number of hits folded into each prompt.
    pub top_k: usize,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Settings for every external integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    /// Source control.
    pub git: GitSettings,
    /// Document store.
    pub confluence: ConfluenceSettings,
    /// Chat notifications.
    pub slack: SlackSettings,
}

/// Source control settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    /// Directory that holds the working copy.
    pub work_directory: String,
    /// Branch pull requests target.
    pub default_branch: String,
    /// Environment variable holding the repository URL.
    pub repo_url_env: String,
    /// Environment variable holding the access token.
    pub token_env: String,
    /// Feature name used in branch names.
    pub feature_name: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            work_directory: "./workspace".to_string(),
            default_branch: "main".to_string(),
            repo_url_env: "GITHUB_REPO_URL".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            feature_name: "windows-metrics".to_string(),
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceSettings {
    /// Environment variable holding the site URL.
    pub base_url_env: String,
    /// Environment variable holding the account email.
    pub email_env: String,
    /// Environment variable holding the API token.
    pub token_env: String,
    /// Environment variable holding the space key.
    pub space_key_env: String,
}

impl Default for ConfluenceSettings {
    fn default() -> Self {
        Self {
            base_url_env: "CONFLUENCE_BASE_URL".to_string(),
            email_env: "CONFLUENCE_USER_EMAIL".to_string(),
            token_env: "CONFLUENCE_API_TOKEN".to_string(),
            space_key_env: "CONFLUENCE_SPACE_KEY".to_string(),
        }
    }
}

/// Chat notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackSettings {
    /// Environment variable holding the bot token.
    pub bot_token_env: String,
    /// Environment variable holding the channel id.
    pub channel_env: String,
    /// Environment variable holding the incoming webhook URL.
    pub webhook_url_env: String,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            bot_token_env: "SLACK_BOT_TOKEN".to_string(),
            channel_env: "SLACK_CHANNEL_ID".to_string(),
            webhook_url_env: "SLACK_WEBHOOK_URL".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.llm.max_tokens, 4096);
        assert!((settings.llm.temperature - 0.1).abs() < f64::EPSILON);
        assert_eq!(settings.knowledge.top_k, 3);
        assert_eq!(settings.integrations.git.work_directory, "./workspace");
        assert_eq!(settings.integrations.git.feature_name, "windows-metrics");
        assert_eq!(settings.integrations.confluence.space_key_env, "CONFLUENCE_SPACE_KEY");
        assert_eq!(settings.integrations.slack.channel_env, "SLACK_CHANNEL_ID");
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = "llm:\n  model: local-model\nintegrations:\n  git:\n    default_branch: develop\n";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.llm.model, "local-model");
        assert_eq!(settings.llm.max_tokens, 4096);
        assert_eq!(settings.integrations.git.default_branch, "develop");
        assert_eq!(settings.integrations.git.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Settings::from_yaml("  \n").unwrap(), Settings::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_config.yaml");
        std::fs::write(&path, "llm: [unclosed").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("OPENAI_BASE_URL", "http://localhost:9000/v1"), ("CHAT_MODEL", "m")]);
        let env = |k: &str| vars.get(k).map(|v| (*v).to_string());
        let llm = LlmSettings::default();
        assert_eq!(llm.resolved_base_url(&env), "http://localhost:9000/v1");
        assert_eq!(llm.resolved_model(&env), "m");

        let none = |_: &str| None;
        assert_eq!(llm.resolved_model(&none), "gpt-4o-mini");
    }
}
