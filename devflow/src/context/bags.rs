//! Append-only context bag.

use crate::errors::DataConflictError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

/// A thread-safe, insertion-ordered bag of stage results.
///
/// Writing to an existing key raises a `DataConflictError`. Values handed out
/// by [`get`](Self::get) are copies, so readers can never mutate an entry
/// written by another stage.
#[derive(Debug, Default)]
pub struct ContextBag {
    data: RwLock<IndexMap<String, Value>>,
}

impl ContextBag {
    /// Creates a new empty context bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a copy of a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Sets a value in the bag.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the key already exists.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<(), DataConflictError> {
        let key = key.into();
        let mut data = self.data.write();

        if data.contains_key(&key) {
            return Err(DataConflictError::new(key));
        }

        data.insert(key, value);
        Ok(())
    }

    /// Returns a copy of all entries in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.data.read().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns all keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let bag = ContextBag::new();
        bag.set("transcript", json!({"project_name": "Metrics"})).unwrap();
        assert_eq!(bag.get("transcript"), Some(json!({"project_name": "Metrics"})));
        assert!(bag.contains_key("transcript"));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_second_write_conflicts() {
        let bag = ContextBag::new();
        bag.set("tests", json!({})).unwrap();
        let err = bag.set("tests", json!({"overwrite": true})).unwrap_err();
        assert_eq!(err.key, "tests");
        assert_eq!(bag.get("tests"), Some(json!({})));
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let bag = ContextBag::new();
        for key in ["transcript", "requirements", "design_spec", "implementation"] {
            bag.set(key, json!(null)).unwrap();
        }
        assert_eq!(
            bag.keys(),
            vec!["transcript", "requirements", "design_spec", "implementation"]
        );
    }

    #[test]
    fn test_get_returns_copy() {
        let bag = ContextBag::new();
        bag.set("implementation", json!({"files_created": []})).unwrap();
        let mut copy = bag.get("implementation").unwrap();
        copy["files_created"] = json!(["a.c"]);
        assert_eq!(bag.get("implementation"), Some(json!({"files_created": []})));
    }

    #[test]
    fn test_empty_bag() {
        let bag = ContextBag::new();
        assert!(bag.is_empty());
        assert!(bag.get("missing").is_none());
        assert!(bag.snapshot().is_empty());
    }
}
