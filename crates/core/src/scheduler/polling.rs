//! Directory polling scheduler.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex as SyncMutex;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::executor::{Executor, LifecycleEvent, LifecycleEventKind, SubscriptionId};
use crate::source::LocalFile;

use super::config::SchedulerConfig;
use super::error::SchedulerError;

/// Snapshot of scheduler state.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub watch_dir: PathBuf,
    /// Files handed to the executor since start.
    pub submitted: u64,
}

/// Periodically scans a directory and submits new or modified files to an
/// executor.
///
/// Files that jobs leave behind inside the watched tree are not submitted
/// again. Stops on [`stop`](Self::stop) or as soon as the executor rejects a
/// file.
pub struct PollingScheduler {
    config: SchedulerConfig,
    executor: Arc<Executor>,
    running: Arc<AtomicBool>,
    submitted: Arc<AtomicU64>,
    /// Job outputs inside the watched tree not yet seen by a scan.
    produced: Arc<SyncMutex<HashSet<PathBuf>>>,
    subscription: SyncMutex<Option<SubscriptionId>>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
    pub fn new(config: SchedulerConfig, executor: Arc<Executor>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            executor,
            running: Arc::new(AtomicBool::new(false)),
            submitted: Arc::new(AtomicU64::new(0)),
            produced: Arc::new(SyncMutex::new(HashSet::new())),
            subscription: SyncMutex::new(None),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Starts the polling task. Calling it again while running does nothing.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if !self.config.watch_dir.is_dir() {
            return Err(SchedulerError::NotADirectory {
                path: self.config.watch_dir.clone(),
            });
        }

        let mut task = self.task.lock().await;
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return Ok(());
        }

        info!(
            watch_dir = %self.config.watch_dir.display(),
            interval_ms = self.config.poll_interval_ms,
            recursive = self.config.recursive,
            "Starting polling scheduler"
        );
        let config = self.config.clone();
        let produced = Arc::clone(&self.produced);
        let id = self
            .executor
            .subscribe(Arc::new(move |_: &str, event: &LifecycleEvent| {
                record_output(&config, &produced, event);
            }));
        *self.subscription.lock() = Some(id);

        *task = Some(self.spawn_poll_loop());
        Ok(())
    }

    /// Signals the polling task and waits for it to exit.
    pub async fn stop(&self) {
        let handle = self.task.lock().await.take();
        let Some(handle) = handle else {
            return;
        };

        info!("Stopping polling scheduler");
        let _ = self.shutdown_tx.send(());
        if let Err(e) = handle.await {
            warn!("Polling task ended abnormally: {}", e);
        }
        if let Some(id) = self.subscription.lock().take() {
            self.executor.unsubscribe(id);
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Polling scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.is_running(),
            watch_dir: self.config.watch_dir.clone(),
            submitted: self.submitted.load(Ordering::Relaxed),
        }
    }

    fn spawn_poll_loop(&self) -> JoinHandle<()> {
        let config = self.config.clone();
        let executor = Arc::clone(&self.executor);
        let running = Arc::clone(&self.running);
        let submitted = Arc::clone(&self.submitted);
        let produced = Arc::clone(&self.produced);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Poll loop started");
            let mut seen: HashMap<PathBuf, SystemTime> = HashMap::new();
            loop {
                let scan_config = config.clone();
                let scanned =
                    tokio::task::spawn_blocking(move || scan_directory(&scan_config)).await;

                match scanned {
                    Ok(Ok(files)) => {
                        if !submit_changed(&executor, &mut seen, &produced, files, &submitted) {
                            info!("Executor no longer accepts work, poll loop exiting");
                            break;
                        }
                    }
                    Ok(Err(e)) => warn!("Scan failed: {}", e),
                    Err(e) => warn!("{}", SchedulerError::Task(e.to_string())),
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Poll loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(config.poll_interval()) => {}
                }
            }
            running.store(false, Ordering::SeqCst);
            info!("Poll loop stopped");
        })
    }
}

/// Remembers where a job left its file when that is inside the watched tree.
fn record_output(
    config: &SchedulerConfig,
    produced: &SyncMutex<HashSet<PathBuf>>,
    event: &LifecycleEvent,
) {
    if !matches!(
        event.kind,
        LifecycleEventKind::SourceExecutionFinished | LifecycleEventKind::SourceExecutionFailed
    ) {
        return;
    }
    let Some(path) = event.output.as_ref().and_then(|output| output.path()) else {
        return;
    };
    if config.watches(path) {
        debug!(path = %path.display(), "Job output stays in the watch directory");
        produced.lock().insert(path.to_path_buf());
    }
}

/// Submits files that are new or changed since the previous scan, except
/// those a job produced. Returns false once the executor rejects a file.
fn submit_changed(
    executor: &Executor,
    seen: &mut HashMap<PathBuf, SystemTime>,
    produced: &SyncMutex<HashSet<PathBuf>>,
    files: Vec<(PathBuf, SystemTime)>,
    submitted: &AtomicU64,
) -> bool {
    let mut current = HashMap::with_capacity(files.len());
    for (path, modified) in files {
        let changed = seen.get(&path) != Some(&modified);
        let from_job = produced.lock().remove(&path);
        if changed && from_job {
            debug!(path = %path.display(), "Skipping file produced by a job");
        } else if changed {
            // The scanned path stays the origin across renames and moves.
            let source = LocalFile::new(&path)
                .with_origin(path.display().to_string())
                .into_handle();
            if !executor.add(source) {
                return false;
            }
            submitted.fetch_add(1, Ordering::Relaxed);
            debug!(path = %path.display(), "Submitted file");
        }
        current.insert(path, modified);
    }
    // Forget deleted files so they are picked up again if they come back.
    *seen = current;
    true
}

/// Lists matching files under the watch directory with their modification
/// times, sorted by path.
pub fn scan_directory(
    config: &SchedulerConfig,
) -> Result<Vec<(PathBuf, SystemTime)>, SchedulerError> {
    let mut files = Vec::new();
    scan_into(&config.watch_dir, config, &mut files)?;
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn scan_into(
    dir: &Path,
    config: &SchedulerConfig,
    files: &mut Vec<(PathBuf, SystemTime)>,
) -> Result<(), SchedulerError> {
    let io_err = |source: std::io::Error| SchedulerError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let metadata = entry.metadata().map_err(io_err)?;

        if metadata.is_dir() {
            if config.recursive {
                scan_into(&path, config, files)?;
            }
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str());
        if metadata.is_file() && config.matches_extension(ext) {
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, modified));
        }
    }
    Ok(())
}
