//! Pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{LogProcessor, MoveProcessor, RenameProcessor};
use crate::naming::{NamePattern, NamePatternError};
use crate::pipeline::{Pipeline, PipelineBuilder, PipelineDefinition, Processor};

/// A named pipeline in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name, unique within a config.
    pub name: String,
    /// Processors in execution order.
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
}

/// One processor in a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessorConfig {
    /// Rename the file from a pattern.
    Rename { pattern: String },
    /// Move the file into a directory.
    Move {
        dest_dir: PathBuf,
        #[serde(default)]
        overwrite: bool,
    },
    /// Log the file and pass it on.
    Log,
}

/// Processor settings with patterns already parsed.
#[derive(Debug, Clone)]
enum PreparedProcessor {
    Rename(NamePattern),
    Move { dest_dir: PathBuf, overwrite: bool },
    Log,
}

impl PreparedProcessor {
    fn prepare(config: &ProcessorConfig) -> Result<Self, NamePatternError> {
        Ok(match config {
            ProcessorConfig::Rename { pattern } => Self::Rename(NamePattern::parse(pattern)?),
            ProcessorConfig::Move {
                dest_dir,
                overwrite,
            } => Self::Move {
                dest_dir: dest_dir.clone(),
                overwrite: *overwrite,
            },
            ProcessorConfig::Log => Self::Log,
        })
    }

    fn instantiate(&self) -> Box<dyn Processor> {
        match self {
            Self::Rename(pattern) => Box::new(RenameProcessor::new(pattern.clone())),
            Self::Move {
                dest_dir,
                overwrite,
            } => Box::new(MoveProcessor::new(dest_dir.clone()).with_overwrite(*overwrite)),
            Self::Log => Box::new(LogProcessor),
        }
    }
}

/// Turns pipeline configuration into executor definitions.
///
/// Patterns are parsed here, so a bad pattern fails at startup. Each
/// definition is a builder: every job run gets fresh processor instances.
pub fn build_pipelines(
    configs: &[PipelineConfig],
) -> Result<Vec<PipelineDefinition>, NamePatternError> {
    configs
        .iter()
        .map(|config| {
            let prepared = config
                .processors
                .iter()
                .map(PreparedProcessor::prepare)
                .collect::<Result<Vec<_>, _>>()?;
            let name = config.name.clone();

            let builder = PipelineBuilder::new(config.name.clone(), move || {
                prepared
                    .iter()
                    .fold(Pipeline::new(name.clone()), |pipeline, p| {
                        pipeline.with_boxed_processor(p.instantiate())
                    })
            });
            Ok(PipelineDefinition::Builder(builder))
        })
        .collect()
}
