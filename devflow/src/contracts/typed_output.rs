//! Response shapes and their validation.
//!
//! Decoding a model response is a single step: `serde` deserializes the
//! value into the kind's struct and [`ResponseShape::validate`] checks the
//! invariants serde cannot express. A value that fails either step is
//! replaced by the kind's fallback by the normalizer.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Component, Path};

/// Error during typed response validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Error message.
    pub message: String,
    /// Field that caused the error, if applicable.
    pub field: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref field) = self.field {
            write!(f, "Field '{}': {}", field, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Caller-supplied tag selecting the expected shape and fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Generated source files.
    Implementation,
    /// Generated test files.
    Tests,
    /// Generated documentation.
    Documentation,
    /// Any JSON; falls back to an empty object.
    Generic,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implementation => write!(f, "implementation"),
            Self::Tests => write!(f, "tests"),
            Self::Documentation => write!(f, "documentation"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// A typed model response.
pub trait ResponseShape: Serialize + DeserializeOwned + Sized {
    /// The kind this shape answers to.
    const KIND: ResponseKind;

    /// Checks invariants beyond what deserialization enforces.
    fn validate(&self) -> Result<(), ValidationError>;

    /// The synthetic, shape-correct value used when parsing fails.
    fn fallback() -> Self;

    /// Adjusts a successfully validated value before it is returned.
    fn post_process(&mut self) {}
}

/// Decodes and validates a JSON value as `T`.
pub fn decode_shape<T: ResponseShape>(value: Value) -> Result<T, ValidationError> {
    let typed: T = serde_json::from_value(value)
        .map_err(|e| ValidationError::new(format!("{} response: {}", T::KIND, e)))?;
    typed.validate()?;
    Ok(typed)
}

/// One file produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Path relative to the working copy root.
    pub path: String,
    /// Full file content.
    pub content: String,
    /// Short description for commit messages and PR bodies.
    #[serde(default)]
    pub description: String,
}

impl GeneratedFile {
    /// Creates a generated file.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            description: description.into(),
        }
    }

    fn validate(&self, field: &str) -> Result<(), ValidationError> {
        if self.path.trim().is_empty() {
            return Err(ValidationError::for_field(field, "file path is empty"));
        }
        let escapes_root = Path::new(&self.path).components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes_root {
            return Err(ValidationError::for_field(
                field,
                format!("path '{}' must stay inside the working copy", self.path),
            ));
        }
        Ok(())
    }
}

fn validate_files(files: &[GeneratedFile], field: &str) -> Result<(), ValidationError> {
    if files.is_empty() {
        return Err(ValidationError::for_field(field, "no files"));
    }
    files.iter().try_for_each(|f| f.validate(field))
}

/// Shape of an `implementation` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationResponse {
    /// Source files to write.
    pub files: Vec<GeneratedFile>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

impl ResponseShape for ImplementationResponse {
    const KIND: ResponseKind = ResponseKind::Implementation;

    fn validate(&self) -> Result<(), ValidationError> {
        validate_files(&self.files, "files")
    }

    fn fallback() -> Self {
        super::fallback::implementation()
    }
}

/// Shape of a `tests` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestsResponse {
    /// Test files to write.
    pub test_files: Vec<GeneratedFile>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

impl ResponseShape for TestsResponse {
    const KIND: ResponseKind = ResponseKind::Tests;

    fn validate(&self) -> Result<(), ValidationError> {
        validate_files(&self.test_files, "test_files")
    }

    fn fallback() -> Self {
        super::fallback::tests()
    }
}

/// The `documentation` object inside a documentation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationBody {
    /// Markdown content.
    pub content: String,
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// One-line summary.
    #[serde(default)]
    pub summary: String,
}

/// Shape of a `documentation` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationResponse {
    /// The document itself.
    pub documentation: DocumentationBody,
    /// Per-function API notes, passed through untouched.
    #[serde(default)]
    pub api_docs: Vec<Value>,
}

impl ResponseShape for DocumentationResponse {
    const KIND: ResponseKind = ResponseKind::Documentation;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.documentation.content.trim().is_empty() {
            return Err(ValidationError::for_field(
                "documentation.content",
                "content is empty",
            ));
        }
        Ok(())
    }

    fn fallback() -> Self {
        super::fallback::documentation()
    }

    fn post_process(&mut self) {
        self.documentation.content =
            crate::normalizer::unescape_documentation(&self.documentation.content);
    }
}

/// Fields extracted from a meeting transcript.
///
/// Every field has a default so that a partial answer still decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptDetails {
    /// People mentioned in the meeting.
    #[serde(default)]
    pub participants: Vec<String>,
    /// Project or feature name.
    #[serde(default = "default_project_name")]
    pub project_name: String,
    /// Main functional requirements.
    #[serde(default)]
    pub key_requirements: Vec<String>,
    /// Technical details mentioned.
    #[serde(default)]
    pub technical_details: Vec<String>,
    /// Repository URL, if one was mentioned.
    #[serde(default)]
    pub repository_url: String,
    /// Platform being targeted.
    #[serde(default = "default_target_platform")]
    pub target_platform: String,
    /// Platform being converted from.
    #[serde(default = "default_source_platform")]
    pub source_platform: String,
    /// Deadlines or timeline notes.
    #[serde(default)]
    pub deadline_info: Option<Value>,
    /// What needs to be built.
    #[serde(default = "default_summary")]
    pub summary: String,
}

fn default_project_name() -> String {
    "AI-Generated Project".to_string()
}

fn default_target_platform() -> String {
    "Windows".to_string()
}

fn default_source_platform() -> String {
    "Linux".to_string()
}

fn default_summary() -> String {
    "Convert Linux code to Windows equivalent".to_string()
}

impl Default for TranscriptDetails {
    fn default() -> Self {
        Self {
            participants: Vec::new(),
            project_name: default_project_name(),
            key_requirements: Vec::new(),
            technical_details: Vec::new(),
            repository_url: String::new(),
            target_platform: default_target_platform(),
            source_platform: default_source_platform(),
            deadline_info: None,
            summary: default_summary(),
        }
    }
}

impl TranscriptDetails {
    /// Details used when the model cannot be reached at all.
    #[must_use]
    pub fn basic_extraction() -> Self {
        Self {
            project_name: "Linux to Windows Conversion".to_string(),
            key_requirements: vec!["Convert Linux code to Windows equivalent".to_string()],
            summary: "Convert Linux system calls to Windows API equivalents".to_string(),
            ..Self::default()
        }
    }

    /// Decodes a generic response, falling back to defaults field by field.
    ///
    /// A field with the wrong type is dropped rather than failing the whole
    /// value, so one malformed list does not discard the project name.
    #[must_use]
    pub fn from_response(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        let mut details = Self::default();
        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        let list = |key: &str| {
            map.get(key).and_then(Value::as_array).map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
            })
        };

        if let Some(v) = list("participants") {
            details.participants = v;
        }
        if let Some(v) = text("project_name").filter(|s| !s.trim().is_empty()) {
            details.project_name = v;
        }
        if let Some(v) = list("key_requirements") {
            details.key_requirements = v;
        }
        if let Some(v) = list("technical_details") {
            details.technical_details = v;
        }
        if let Some(v) = text("repository_url") {
            details.repository_url = v;
        }
        if let Some(v) = text("target_platform").filter(|s| !s.trim().is_empty()) {
            details.target_platform = v;
        }
        if let Some(v) = text("source_platform").filter(|s| !s.trim().is_empty()) {
            details.source_platform = v;
        }
        details.deadline_info = map.get("deadline_info").filter(|v| !v.is_null()).cloned();
        if let Some(v) = text("summary").filter(|s| !s.trim().is_empty()) {
            details.summary = v;
        }
        details
    }
}
