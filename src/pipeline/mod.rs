//! Fix pipeline: request validation, stage coordination and batch results

mod coordinator;
mod request;
mod result;

pub use coordinator::{BatchFailureHook, BatchMode, FixPipeline};
pub use request::{validate_request, AnalysisType, FixRequest, ValidatedRequest, ValidationError};
pub use result::{BatchProcessResult, ErrorKind, FixProcessResult, PipelineStage};
