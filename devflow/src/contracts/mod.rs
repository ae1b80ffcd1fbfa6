//! Typed response contracts.
//!
//! Every model response a stage consumes has exactly one shape, declared here
//! next to its validation rule and its fallback payload:
//! - `implementation` decodes to [`ImplementationResponse`]
//! - `tests` decodes to [`TestsResponse`]
//! - `documentation` decodes to [`DocumentationResponse`]
//! - `generic` responses stay untyped JSON

mod fallback;
mod typed_output;

pub use fallback::fallback_value;
pub use typed_output::{
    decode_shape, DocumentationBody, DocumentationResponse, GeneratedFile,
    ImplementationResponse, ResponseKind, ResponseShape, TestsResponse, TranscriptDetails,
    ValidationError,
};
