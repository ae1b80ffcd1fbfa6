//! Core domain model types for devflow.
//!
//! - Stage status enum
//! - Stage result mapping with failure inference

mod output;
mod status;

pub use output::StageResult;
pub use status::StageStatus;
