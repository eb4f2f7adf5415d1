//! Error types for the pipeline module.

use std::path::PathBuf;
use thiserror::Error;

use crate::naming::NamePatternError;

/// Errors raised by a single processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination already exists and overwrite is disabled.
    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// The source cannot be handled by this processor.
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// Name generation failed.
    #[error("Name pattern error: {0}")]
    Pattern(#[from] NamePatternError),

    /// Any other processing failure.
    #[error("{0}")]
    Failed(String),
}

/// Error returned by [`Pipeline::execute`](super::Pipeline::execute).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A processor in the chain failed; the rest of the chain was skipped.
    #[error("Processor '{processor}' failed: {source}")]
    Processor {
        processor: String,
        #[source]
        source: ProcessorError,
    },
}

impl PipelineError {
    /// Name of the processor that failed.
    pub fn processor(&self) -> &str {
        match self {
            PipelineError::Processor { processor, .. } => processor,
        }
    }
}
