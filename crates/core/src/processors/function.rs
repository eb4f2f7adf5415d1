//! Closure-backed processor.

use crate::pipeline::{Processor, ProcessorError};
use crate::source::SourceHandle;

type ProcessFn = dyn Fn(SourceHandle) -> Result<SourceHandle, ProcessorError> + Send + Sync;

/// A processor defined by a closure.
pub struct FnProcessor {
    name: String,
    process: Box<ProcessFn>,
}

impl FnProcessor {
    /// Creates a processor from a closure.
    pub fn new<F>(name: impl Into<String>, process: F) -> Self
    where
        F: Fn(SourceHandle) -> Result<SourceHandle, ProcessorError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            process: Box::new(process),
        }
    }
}

impl Processor for FnProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, source: SourceHandle) -> Result<SourceHandle, ProcessorError> {
        (self.process)(source)
    }
}
