//! Stage result mapping.

use super::StageStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The result of one stage execution.
///
/// A stage result is an open JSON mapping. Its status is not stored
/// separately: a result is considered failed when it carries `success: false`
/// or an `error` entry. This keeps the payload handed to collaborators and the
/// final report identical to what the stage wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageResult {
    data: Map<String, Value>,
}

impl StageResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a result from a JSON value.
    ///
    /// Objects are taken as-is; anything else is stored under `value`.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(data) => Self { data },
            other => {
                let mut data = Map::new();
                data.insert("value".to_string(), other);
                Self { data }
            }
        }
    }

    /// Creates a successful result, adding `success: true` when absent.
    #[must_use]
    pub fn success(value: Value) -> Self {
        let mut result = Self::from_value(value);
        result
            .data
            .entry("success")
            .or_insert(Value::Bool(true));
        result
    }

    /// Creates a failed result with an error code and a readable message.
    #[must_use]
    pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("success".to_string(), Value::Bool(false));
        data.insert("error".to_string(), Value::String(error.into()));
        data.insert("message".to_string(), Value::String(message.into()));
        Self { data }
    }

    /// Adds or replaces a field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Returns the inferred status.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        let explicit_failure = matches!(self.data.get("success"), Some(Value::Bool(false)));
        let has_error = self.data.get("error").is_some_and(|e| !e.is_null());
        if explicit_failure || has_error {
            StageStatus::Failed
        } else {
            StageStatus::Completed
        }
    }

    /// Returns true if the result carries no error indicator.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// Returns true if the result carries an error indicator.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status().is_failure()
    }

    /// Gets a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Gets a string field, or `""`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> &str {
        self.data.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Returns the error message if the result failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.data.get("error").and_then(Value::as_str)
    }

    /// Borrows the underlying mapping.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Converts into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }
}

impl From<StageResult> for Value {
    fn from(result: StageResult) -> Self {
        result.into_value()
    }
}
