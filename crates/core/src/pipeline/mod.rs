//! Processor pipelines.
//!
//! A [`Pipeline`] is an ordered, immutable chain of [`Processor`]s. Each
//! processor receives a source and returns the source the next stage should
//! work on (the same one, or a replacement after a rename or move).
//!
//! The executor holds [`PipelineDefinition`]s rather than pipelines: a
//! definition is either an already built pipeline shared by every job, or a
//! [`PipelineBuilder`] that produces a fresh pipeline each time a job runs
//! it, so processors with per-run state never share it between jobs.

mod error;
mod traits;
mod types;

pub use error::{PipelineError, ProcessorError};
pub use traits::Processor;
pub use types::{Pipeline, PipelineBuilder, PipelineDefinition};
