//! Prometheus export for the daemon.
//!
//! The core keeps its metrics as process-wide statics; this module owns the
//! registry they are exported from.

use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

fn register_metrics(registry: &Registry) {
    for metric in mediaflow_core::metrics::all_metrics() {
        if let Err(e) = registry.register(metric) {
            warn!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics in prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics are not valid UTF-8")
}

/// Write the current metrics to `path`, creating parent directories.
pub fn write_metrics_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let text = encode_metrics()?;
    std::fs::write(path, text).with_context(|| format!("Failed to write metrics to {:?}", path))
}
