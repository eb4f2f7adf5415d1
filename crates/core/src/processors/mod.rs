//! Built-in processors and the configuration that assembles them.
//!
//! - [`RenameProcessor`]: renames a file in place from a name pattern
//! - [`MoveProcessor`]: moves a file into a directory
//! - [`LogProcessor`]: logs the source and passes it on
//! - [`FnProcessor`]: adapts a closure, mostly for tests and embedding

mod config;
mod function;
mod log;
mod relocate;
mod rename;

pub use config::{build_pipelines, PipelineConfig, ProcessorConfig};
pub use function::FnProcessor;
pub use log::LogProcessor;
pub use relocate::MoveProcessor;
pub use rename::RenameProcessor;

use std::path::Path;

use crate::pipeline::ProcessorError;
use crate::source::SourceHandle;

/// Path of a source, or an error naming the processor that needed it.
fn require_path<'a>(source: &'a SourceHandle, processor: &str) -> Result<&'a Path, ProcessorError> {
    source.path().ok_or_else(|| {
        ProcessorError::InvalidSource(format!(
            "{} requires a file on disk, '{}' has no path",
            processor,
            source.name()
        ))
    })
}
