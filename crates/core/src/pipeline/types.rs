//! Pipeline types.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::error::PipelineError;
use super::traits::Processor;
use crate::source::SourceHandle;

/// An ordered chain of processors.
pub struct Pipeline {
    name: String,
    processors: Vec<Box<dyn Processor>>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processors: Vec::new(),
        }
    }

    /// Appends a processor to the chain.
    pub fn with_processor(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Appends an already boxed processor to the chain.
    pub fn with_boxed_processor(mut self, processor: Box<dyn Processor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of processors in the chain.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the chain has no processors.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs every processor in order.
    ///
    /// `begin_execute` is called on the input source before the first stage
    /// and `end_execute` after the last one, on failure too. The first
    /// failing processor stops the chain.
    pub fn execute(&self, source: SourceHandle) -> Result<SourceHandle, PipelineError> {
        let start = Instant::now();
        source.begin_execute();

        let mut current = Arc::clone(&source);
        let mut result = Ok(());
        for processor in &self.processors {
            debug!(
                pipeline = %self.name,
                processor = processor.name(),
                source = current.name(),
                "Running processor"
            );
            match processor.process(Arc::clone(&current)) {
                Ok(next) => current = next,
                Err(e) => {
                    result = Err(PipelineError::Processor {
                        processor: processor.name().to_string(),
                        source: e,
                    });
                    break;
                }
            }
        }

        source.end_execute();
        debug!(
            pipeline = %self.name,
            duration_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Pipeline finished"
        );
        result.map(|()| current)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.processors.iter().map(|p| p.name()).collect();
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("processors", &names)
            .finish()
    }
}

type BuildFn = dyn Fn() -> Pipeline + Send + Sync;

/// Produces a new, independent [`Pipeline`] on every [`build`](Self::build).
#[derive(Clone)]
pub struct PipelineBuilder {
    name: String,
    build: Arc<BuildFn>,
}

impl PipelineBuilder {
    /// Creates a builder from a factory closure.
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn() -> Pipeline + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    /// Name of the pipelines this builder produces.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds a fresh pipeline.
    pub fn build(&self) -> Pipeline {
        (self.build)()
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A pipeline as registered with the executor.
#[derive(Debug, Clone)]
pub enum PipelineDefinition {
    /// One pipeline instance shared by every job.
    Built(Arc<Pipeline>),
    /// A builder invoked once per job run.
    Builder(PipelineBuilder),
}

impl PipelineDefinition {
    /// Returns the pipeline to run for one job.
    pub fn resolve(&self) -> Arc<Pipeline> {
        match self {
            PipelineDefinition::Built(pipeline) => Arc::clone(pipeline),
            PipelineDefinition::Builder(builder) => Arc::new(builder.build()),
        }
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        match self {
            PipelineDefinition::Built(pipeline) => pipeline.name(),
            PipelineDefinition::Builder(builder) => builder.name(),
        }
    }
}

impl From<Pipeline> for PipelineDefinition {
    fn from(pipeline: Pipeline) -> Self {
        PipelineDefinition::Built(Arc::new(pipeline))
    }
}

impl From<PipelineBuilder> for PipelineDefinition {
    fn from(builder: PipelineBuilder) -> Self {
        PipelineDefinition::Builder(builder)
    }
}
