//! Test assertions for stage results.

use crate::core::{StageResult, StageStatus};
use crate::pipeline::FinalResult;

/// Asserts that the result indicates success.
pub fn assert_result_succeeded(result: &StageResult) {
    assert!(
        result.is_success(),
        "Expected success, got error: {:?}",
        result.error()
    );
}

/// Asserts that the result indicates failure.
pub fn assert_result_failed(result: &StageResult) {
    assert!(
        result.is_failure(),
        "Expected failure, got: {:?}",
        result.as_map()
    );
}

/// Asserts that the result has the expected status.
pub fn assert_result_status(result: &StageResult, expected: StageStatus) {
    assert_eq!(
        result.status(),
        expected,
        "Expected status {:?}, got {:?}",
        expected,
        result.status()
    );
}

/// Asserts that the result contains a specific key.
pub fn assert_result_contains(result: &StageResult, key: &str) {
    assert!(
        result.get(key).is_some(),
        "Expected result to contain key '{}'. Keys: {:?}",
        key,
        result.as_map().keys().collect::<Vec<_>>()
    );
}

/// Asserts that a final report records exactly these stages, in order.
pub fn assert_stage_order(report: &FinalResult, expected: &[&str]) {
    let keys: Vec<&str> = report.stages.keys().map(String::as_str).collect();
    assert_eq!(keys, expected, "Unexpected stage order");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_assertions() {
        let result = StageResult::success(json!({"page_id": "1"}));
        assert_result_succeeded(&result);
        assert_result_status(&result, StageStatus::Completed);
        assert_result_contains(&result, "page_id");
    }

    #[test]
    #[should_panic(expected = "Expected failure")]
    fn test_failed_assertion_panics() {
        assert_result_failed(&StageResult::success(json!({})));
    }

    #[test]
    fn test_stage_order() {
        let mut report = FinalResult::new("workflow_1", "out");
        report.stages.insert("transcript".into(), json!({}));
        report.stages.insert("requirements".into(), json!({}));
        assert_stage_order(&report, &["transcript", "requirements"]);
    }
}
