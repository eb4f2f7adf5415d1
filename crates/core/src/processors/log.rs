//! Pass-through processor that logs what flows by.

use tracing::info;

use crate::pipeline::{Processor, ProcessorError};
use crate::source::SourceHandle;

/// Logs each source at info level and returns it unchanged.
#[derive(Debug, Default)]
pub struct LogProcessor;

impl Processor for LogProcessor {
    fn name(&self) -> &str {
        "log"
    }

    fn process(&self, source: SourceHandle) -> Result<SourceHandle, ProcessorError> {
        info!(
            source = source.name(),
            path = ?source.path(),
            origin = ?source.origin(),
            "Processing source"
        );
        Ok(source)
    }
}
