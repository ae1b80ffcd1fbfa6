//! Testing utilities for devflow pipelines.
//!
//! This module provides:
//! - In-memory doubles for every collaborator
//! - Mock stages and counting sessions for runner tests
//! - Assertions over stage results and final reports

mod assertions;
mod doubles;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_result_contains, assert_result_failed, assert_result_status, assert_result_succeeded,
    assert_stage_order,
};
pub use doubles::{
    RecordingDocumentStore, RecordingNotifier, RecordingSourceControl, ScriptedModel,
    FAKE_CHECKOUT,
};
pub use fixtures::{
    fake_collaborators, stage_context, CountingSession, CountingSessionFactory, Fakes,
};
pub use mocks::{FailingStage, HangingStage, MockStage, RecordingStage};
