//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the directory polling scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Directory to scan.
    pub watch_dir: PathBuf,

    /// Delay between two scans (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Descend into subdirectories.
    #[serde(default)]
    pub recursive: bool,

    /// File extensions to pick up, without the dot. Empty means every file.
    #[serde(default)]
    pub extensions: Vec<String>,
}

fn default_poll_interval() -> u64 {
    2000 // 2 seconds
}

impl SchedulerConfig {
    pub fn new(watch_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            poll_interval_ms: default_poll_interval(),
            recursive: false,
            extensions: Vec::new(),
        }
    }

    pub fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Whether a file with this extension should be submitted.
    pub fn matches_extension(&self, ext: Option<&str>) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        match ext {
            Some(ext) => self
                .extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// Whether a scan would list this file.
    pub fn watches(&self, path: &Path) -> bool {
        let in_scope = if self.recursive {
            path.starts_with(&self.watch_dir) && path != self.watch_dir
        } else {
            path.parent() == Some(self.watch_dir.as_path())
        };
        in_scope && self.matches_extension(path.extension().and_then(|e| e.to_str()))
    }
}
