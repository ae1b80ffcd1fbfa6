//! Context management for pipeline execution.
//!
//! This module provides:
//! - The append-only bag of stage results
//! - Run identity and the timestamp-derived workflow id
//! - Pipeline and stage execution contexts

mod bags;
mod execution;
mod identity;

pub use bags::ContextBag;
pub use execution::{PipelineContext, StageContext};
pub use identity::RunIdentity;
