use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::naming::NamePattern;
use crate::processors::ProcessorConfig;

/// Validate configuration
/// Currently validates:
/// - executor.thread_count is not 0
/// - at least one pipeline, names unique, none empty
/// - rename patterns parse
/// - scheduler poll interval is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.executor.thread_count == 0 {
        return Err(ConfigError::ValidationError(
            "executor.thread_count cannot be 0".to_string(),
        ));
    }

    if config.pipelines.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one [[pipelines]] entry is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for pipeline in &config.pipelines {
        if !names.insert(pipeline.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate pipeline name '{}'",
                pipeline.name
            )));
        }
        if pipeline.processors.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "pipeline '{}' has no processors",
                pipeline.name
            )));
        }
        for processor in &pipeline.processors {
            if let ProcessorConfig::Rename { pattern } = processor {
                NamePattern::parse(pattern).map_err(|e| {
                    ConfigError::ValidationError(format!("pipeline '{}': {}", pipeline.name, e))
                })?;
            }
        }
    }

    if let Some(scheduler) = &config.scheduler {
        if scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.poll_interval_ms cannot be 0".to_string(),
            ));
        }
    }

    Ok(())
}
