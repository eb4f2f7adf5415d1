//! Prometheus metrics for the executor.
//!
//! Metrics are process-wide statics; register them in a registry with
//! [`all_metrics`] to export them.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Admission
// =============================================================================

/// Jobs accepted by `add`.
pub static JOBS_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("mediaflow_jobs_added_total", "Total jobs accepted by the executor").unwrap()
});

/// Jobs refused by `add` because the executor was stopped or dying.
pub static JOBS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediaflow_jobs_rejected_total",
        "Total jobs rejected because the executor no longer accepts work",
    )
    .unwrap()
});

// =============================================================================
// Execution
// =============================================================================

/// Jobs claimed by a worker.
pub static JOBS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("mediaflow_jobs_started_total", "Total jobs claimed by a worker").unwrap()
});

/// Jobs whose pipelines all succeeded.
pub static JOBS_FINISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediaflow_jobs_finished_total",
        "Total jobs that ran every pipeline successfully",
    )
    .unwrap()
});

/// Failed pipeline runs by pipeline.
pub static PIPELINE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediaflow_pipeline_failures_total", "Total failed pipeline runs"),
        &["pipeline"], // "init" for source initialization failures
    )
    .unwrap()
});

/// Jobs currently claimed by a worker.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("mediaflow_jobs_in_flight", "Jobs currently being processed").unwrap()
});

/// Pipeline run duration in seconds.
pub static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediaflow_pipeline_duration_seconds",
            "Duration of a single pipeline run",
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        &["pipeline", "result"], // result: "success", "failed"
    )
    .unwrap()
});

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_ADDED.clone()),
        Box::new(JOBS_REJECTED.clone()),
        Box::new(JOBS_STARTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(PIPELINE_FAILURES.clone()),
        Box::new(JOBS_IN_FLIGHT.clone()),
        Box::new(PIPELINE_DURATION.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_metrics() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        JOBS_ADDED.inc();
        PIPELINE_FAILURES.with_label_values(&["organize"]).inc();

        let families = registry.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"mediaflow_jobs_added_total"));
        assert!(names.contains(&"mediaflow_pipeline_failures_total"));
    }
}
