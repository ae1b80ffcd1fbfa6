//! Error types for devflow.
//!
//! Only a small part of this taxonomy ever crosses the pipeline boundary.
//! Collaborator failures are caught by the stage that made the call and turned
//! into a failed [`StageResult`](crate::core::StageResult). Parse failures never
//! surface at all. What remains for [`DevflowError`] is configuration, setup
//! and programming errors.

use thiserror::Error;

/// The main error type for devflow operations.
#[derive(Debug, Error)]
pub enum DevflowError {
    /// The mandatory shared session could not be established.
    #[error("Setup failed: {0}")]
    Setup(String),

    /// The configuration file could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A pipeline definition was rejected.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A context entry was written twice.
    #[error("{0}")]
    DataConflict(#[from] DataConflictError),

    /// A collaborator failed outside of a stage boundary.
    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when a pipeline definition is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the involved stages.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// Error raised when a key already exists in the pipeline context.
#[derive(Debug, Clone, Error)]
#[error("Data conflict: key '{key}' already exists")]
pub struct DataConflictError {
    /// The conflicting key.
    pub key: String,
}

impl DataConflictError {
    /// Creates a new data conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Path of the config file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for the expected schema.
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: String,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failure reported by an external collaborator.
///
/// Stages convert these into `{success: false, error, message}` results.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The collaborator was not configured for this run.
    #[error("{0} is not configured")]
    Unavailable(String),

    /// The request never produced an HTTP response.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote API answered with an error.
    #[error("API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or API error string.
        body: String,
    },

    /// An external command exited unsuccessfully.
    #[error("Command `{command}` failed: {stderr}")]
    Command {
        /// The command line that was run.
        command: String,
        /// Captured standard error.
        stderr: String,
    },

    /// A request was refused before reaching the remote side.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// A response could not be decoded.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Local IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    /// Returns a short machine-readable code for stage results.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Transport(_) => "transport",
            Self::Api { .. } => "api",
            Self::Command { .. } => "command",
            Self::Rejected(_) => "rejected",
            Self::Decode(_) => "decode",
            Self::Io(_) => "io",
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
