//! # Devflow
//!
//! Turns a recorded meeting transcript into a delivered change.
//!
//! A run walks twelve stages in a fixed order:
//!
//! - **Planning**: transcript analysis, requirements and a technical design
//! - **Publishing**: a project folder and pages in the document store
//! - **Delivery**: repository checkout, generated code and tests, docs and a
//!   pull request
//! - **Notification**: a team message linking the results
//!
//! Each stage reads earlier results from a shared context and records its own
//! under its name. A failing collaborator degrades one stage, never the run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use devflow::prelude::*;
//!
//! let pipeline = devflow::app::prepare(Path::new("config/agent_config.yaml"))?;
//! let result = devflow::app::run_workflow(&pipeline, transcript, output_dir).await?;
//! pipeline.cleanup().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod app;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod events;
pub mod links;
pub mod normalizer;
pub mod observability;
pub mod pipeline;
pub mod session;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collaborators::{
        Collaborators, DocumentStore, KnowledgeBase, LanguageModel, Notifier, SourceControl,
    };
    pub use crate::config::Settings;
    pub use crate::context::{PipelineContext, RunIdentity, StageContext};
    pub use crate::core::{StageResult, StageStatus};
    pub use crate::errors::{
        CollaboratorError, ConfigError, DataConflictError, DevflowError,
        PipelineValidationError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{FinalResult, Pipeline, PipelineBuilder, PipelineInput};
    pub use crate::session::{Session, SessionFactory};
    pub use crate::stages::{workflow, Stage, WorkflowOptions};
}
