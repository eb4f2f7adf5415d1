//! Types for the executor.

use std::any::Any;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned synchronously by executor construction and startup.
///
/// Job failures are never returned here; they surface as
/// `SourceExecutionFailed` lifecycle events.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A constructor argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Point-in-time view of an executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorStatus {
    /// Executor name.
    pub name: String,
    /// Whether workers are dispatching jobs.
    pub running: bool,
    /// Whether `add` currently accepts jobs.
    pub accepting: bool,
    /// Worker threads spawned and not yet joined.
    pub worker_count: usize,
    /// Jobs waiting to be claimed.
    pub pending: usize,
    /// Jobs currently claimed by a worker.
    pub in_flight: usize,
    /// Jobs accepted since construction.
    pub total_added: u64,
    /// Jobs whose pipelines all succeeded.
    pub total_finished: u64,
    /// Failed pipeline runs (a job may fail more than one pipeline).
    pub total_failed: u64,
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExecutorError::InvalidArgument("thread_count must be greater than 0".to_string());
        assert_eq!(
            err.to_string(),
            "invalid argument: thread_count must be greater than 0"
        );
    }

    #[test]
    fn test_status_serialization() {
        let status = ExecutorStatus {
            name: "executor".to_string(),
            running: true,
            accepting: true,
            worker_count: 4,
            pending: 2,
            ..Default::default()
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"worker_count\":4"));
        assert!(json.contains("\"running\":true"));
    }

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("disk on fire")).unwrap_err();
        assert_eq!(panic_message(&caught), "disk on fire");

        let caught = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(&caught), "code 7");
    }
}
