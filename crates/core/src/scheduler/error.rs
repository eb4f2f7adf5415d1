//! Scheduler error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Watch directory does not exist or is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Failed to scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan task failed: {0}")]
    Task(String),
}
