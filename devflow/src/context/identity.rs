//! Run identity for tracking pipeline executions.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one pipeline run.
///
/// The start time is captured once so that every title, branch name and
/// identifier derived from it within a run agrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this pipeline run.
    pub pipeline_run_id: Uuid,

    /// When the run started, in local time.
    pub started_at: DateTime<Local>,
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdentity {
    /// Creates a new run identity starting now.
    #[must_use]
    pub fn new() -> Self {
        Self::started_at(Local::now())
    }

    /// Creates a run identity with a fixed start time.
    #[must_use]
    pub fn started_at(started_at: DateTime<Local>) -> Self {
        Self {
            pipeline_run_id: Uuid::now_v7(),
            started_at,
        }
    }

    /// Returns the workflow id, `workflow_YYYYmmdd_HHMMSS`.
    #[must_use]
    pub fn workflow_id(&self) -> String {
        format!("workflow_{}", self.started_at.format("%Y%m%d_%H%M%S"))
    }

    /// Returns the start time as unix seconds.
    #[must_use]
    pub fn unix_timestamp(&self) -> i64 {
        self.started_at.timestamp()
    }

    /// Returns the start date as `YYYYmmdd`.
    #[must_use]
    pub fn date_stamp(&self) -> String {
        self.started_at.format("%Y%m%d").to_string()
    }

    /// Returns the start time as `YYYY-mm-dd HH:MM:SS`.
    #[must_use]
    pub fn display_time(&self) -> String {
        self.started_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
