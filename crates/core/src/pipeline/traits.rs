//! Trait definitions for the pipeline module.

use super::error::ProcessorError;
use crate::source::SourceHandle;

/// One stage of a pipeline.
///
/// A processor either transforms a source (returning a replacement) or
/// consumes it (returning it unchanged). Processors may be shared between
/// threads when their pipeline is registered pre-built, so per-run state has
/// to live behind interior mutability.
pub trait Processor: Send + Sync {
    /// Returns the name of this processor, used in errors and logs.
    fn name(&self) -> &str;

    /// Processes a source and returns the source for the next stage.
    fn process(&self, source: SourceHandle) -> Result<SourceHandle, ProcessorError>;
}
