use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::executor::ExecutorConfig;
use crate::processors::PipelineConfig;
use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Directory polling; absent means sources only come from `add` calls.
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

/// Settings that only the daemon binary uses.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DaemonConfig {
    /// Where to write prometheus metrics on shutdown.
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}
