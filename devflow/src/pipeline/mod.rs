//! Pipeline building and execution.
//!
//! This module provides:
//! - `PipelineBuilder`, which validates an ordered stage list
//! - `Pipeline`, the sequential runner with exactly-once session cleanup
//! - Retry helpers for collaborator calls

mod builder;
mod retry;
mod runner;

pub use builder::PipelineBuilder;
pub use retry::{with_retry_if, BackoffStrategy, JitterStrategy, RetryConfig};
pub use runner::{FinalResult, Pipeline, PipelineInput};
