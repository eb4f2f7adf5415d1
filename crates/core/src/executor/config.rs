//! Executor configuration.

use serde::{Deserialize, Serialize};

use crate::comparer::ComparerKind;

/// Configuration for the executor. Fixed once the executor is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Label used as the event sender and in logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of worker threads. Must be greater than zero.
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Skip the remaining pipelines of a job once one of them fails.
    #[serde(default)]
    pub abort_pipeline_on_error: bool,

    /// Shut the executor down after the first failure.
    #[serde(default)]
    pub die_on_exception: bool,

    /// How sources are compared for conflicts.
    #[serde(default)]
    pub comparer: ComparerKind,
}

fn default_name() -> String {
    "executor".to_string()
}

fn default_thread_count() -> usize {
    1
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            thread_count: default_thread_count(),
            abort_pipeline_on_error: false,
            die_on_exception: false,
            comparer: ComparerKind::default(),
        }
    }
}

impl ExecutorConfig {
    /// Sets the executor name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of worker threads.
    pub fn with_thread_count(mut self, threads: usize) -> Self {
        self.thread_count = threads;
        self
    }

    /// Enables or disables aborting a job's pipelines on error.
    pub fn with_abort_pipeline_on_error(mut self, enabled: bool) -> Self {
        self.abort_pipeline_on_error = enabled;
        self
    }

    /// Enables or disables shutting down on the first failure.
    pub fn with_die_on_exception(mut self, enabled: bool) -> Self {
        self.die_on_exception = enabled;
        self
    }

    /// Sets the conflict comparer.
    pub fn with_comparer(mut self, comparer: ComparerKind) -> Self {
        self.comparer = comparer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.name, "executor");
        assert_eq!(config.thread_count, 1);
        assert!(!config.abort_pipeline_on_error);
        assert!(!config.die_on_exception);
        assert_eq!(config.comparer, ComparerKind::Reference);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: ExecutorConfig = toml::from_str("thread_count = 4").unwrap();
        assert_eq!(config.thread_count, 4);
        assert_eq!(config.name, "executor");
        assert!(!config.die_on_exception);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            name = "library"
            thread_count = 8
            abort_pipeline_on_error = true
            die_on_exception = true
            comparer = "name"
        "#;
        let config: ExecutorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.name, "library");
        assert_eq!(config.thread_count, 8);
        assert!(config.abort_pipeline_on_error);
        assert!(config.die_on_exception);
        assert_eq!(config.comparer, ComparerKind::Name);
    }

    #[test]
    fn test_config_builder() {
        let config = ExecutorConfig::default()
            .with_name("test")
            .with_thread_count(3)
            .with_abort_pipeline_on_error(true)
            .with_die_on_exception(true)
            .with_comparer(ComparerKind::AlwaysEqual);

        assert_eq!(config.name, "test");
        assert_eq!(config.thread_count, 3);
        assert!(config.abort_pipeline_on_error);
        assert!(config.die_on_exception);
        assert_eq!(config.comparer, ComparerKind::AlwaysEqual);
    }
}
