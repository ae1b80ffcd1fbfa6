//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::context::StageContext;
use crate::core::StageResult;
use crate::stages::Stage;

/// A mock stage that records calls and returns a configurable result.
#[derive(Debug)]
pub struct MockStage {
    name: String,
    result: Mutex<StageResult>,
    call_count: Mutex<usize>,
    seen: Mutex<Vec<Vec<String>>>,
}

impl MockStage {
    /// Creates a mock stage that succeeds with `{"stage": name}`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            result: Mutex::new(StageResult::success(json!({ "stage": name }))),
            name,
            call_count: Mutex::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Sets the result to return.
    pub fn set_result(&self, result: StageResult) {
        *self.result.lock() = result;
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }

    /// Returns the context keys visible on each call.
    #[must_use]
    pub fn seen_keys(&self) -> Vec<Vec<String>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        *self.call_count.lock() += 1;
        self.seen
            .lock()
            .push(ctx.pipeline().results().keys().cloned().collect());
        self.result.lock().clone()
    }
}

/// A stage that always records a failure.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: String,
}

impl FailingStage {
    /// Creates a failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageResult {
        StageResult::failure(&self.error, format!("Failed to run {}: {}", self.name, self.error))
    }
}

/// A stage that appends its name to a shared log when it runs.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingStage {
    /// Creates a recording stage writing to `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageResult {
        self.log.lock().push(self.name.clone());
        StageResult::success(Value::Object(serde_json::Map::new()))
    }
}

/// A stage that never finishes.
///
/// It signals [`HangingStage::started`] once it is running, so a test can
/// interrupt the run at a known point.
#[derive(Debug)]
pub struct HangingStage {
    name: String,
    started: Arc<Notify>,
}

impl HangingStage {
    /// Creates a hanging stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started: Arc::new(Notify::new()),
        }
    }

    /// Notified when execution begins. The permit is kept if nobody waits yet.
    #[must_use]
    pub fn started(&self) -> Arc<Notify> {
        self.started.clone()
    }
}

#[async_trait]
impl Stage for HangingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageResult {
        self.started.notify_one();
        std::future::pending::<StageResult>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PipelineContext, RunIdentity};

    fn ctx(name: &str) -> StageContext {
        StageContext::new(
            Arc::new(PipelineContext::new(RunIdentity::new(), "t.txt", "out")),
            name,
        )
    }

    #[tokio::test]
    async fn test_mock_stage_counts_calls() {
        let stage = MockStage::new("transcript");
        let result = stage.execute(&ctx("transcript")).await;
        assert_eq!(result.get_str("stage"), "transcript");
        assert_eq!(stage.call_count(), 1);

        stage.set_result(StageResult::failure("x", "y"));
        assert!(stage.execute(&ctx("transcript")).await.is_failure());
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let result = FailingStage::new("tests", "boom").execute(&ctx("tests")).await;
        assert_eq!(result.error(), Some("boom"));
    }
}
