//! Producers that feed sources into an executor.
//!
//! [`PollingScheduler`] watches a directory and submits every file that is
//! new, or whose modification time changed, since the previous scan.

mod config;
mod error;
mod polling;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use polling::{scan_directory, PollingScheduler, SchedulerStatus};
