//! Executor implementation.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use tracing::{debug, error, info, warn};

use crate::comparer::SourceComparer;
use crate::metrics;
use crate::pipeline::PipelineDefinition;
use crate::source::SourceHandle;

use super::config::ExecutorConfig;
use super::events::{
    EventBus, LifecycleEvent, LifecycleEventKind, LifecycleObserver, SubscriptionId,
};
use super::queue::{Job, JobQueue};
use super::types::{panic_message, ExecutorError, ExecutorStatus};

thread_local! {
    // Nesting depth of `add` calls on this thread still delivering `SourceAdded`.
    static ADMITTING: Cell<usize> = const { Cell::new(0) };
    // Address of the executor whose worker loop runs on this thread, or 0.
    static WORKER_OF: Cell<usize> = const { Cell::new(0) };
}

fn admitting() -> usize {
    ADMITTING.with(Cell::get)
}

/// Runs sources through pipelines on a fixed pool of worker threads.
pub struct Executor {
    config: ExecutorConfig,
    inner: Arc<ExecutorInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    // Serializes initialize and stop. Reentrant so observers of `Initialize`
    // and `Stop` may call either.
    lifecycle: ReentrantMutex<()>,
    initialized: AtomicBool,
    // Set when `stop` runs inside a `SourceAdded` callback of an executor
    // that never started; the outermost `add` finishes the stop.
    stop_deferred: AtomicBool,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// State shared with the worker threads.
struct ExecutorInner {
    name: String,
    abort_pipeline_on_error: bool,
    die_on_exception: bool,
    queue: JobQueue,
    events: EventBus,
    pipelines: OnceCell<Vec<PipelineDefinition>>,
    live_workers: AtomicUsize,
    terminated: AtomicBool,
    stop_emitted: Mutex<bool>,
    stop_signal: Condvar,
    total_added: AtomicU64,
    total_finished: AtomicU64,
    total_failed: AtomicU64,
}

impl Executor {
    /// Creates an executor using the comparer named in the config.
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let comparer = config.comparer.build();
        Self::with_comparer(config, comparer)
    }

    /// Creates an executor with a caller-supplied comparer.
    ///
    /// Fails when `thread_count` is zero. No thread is started until
    /// [`initialize`](Self::initialize).
    pub fn with_comparer(
        config: ExecutorConfig,
        comparer: Arc<dyn SourceComparer>,
    ) -> Result<Self, ExecutorError> {
        if config.thread_count == 0 {
            return Err(ExecutorError::InvalidArgument(
                "thread_count must be greater than 0".to_string(),
            ));
        }

        let inner = Arc::new(ExecutorInner {
            name: config.name.clone(),
            abort_pipeline_on_error: config.abort_pipeline_on_error,
            die_on_exception: config.die_on_exception,
            queue: JobQueue::new(comparer),
            events: EventBus::default(),
            pipelines: OnceCell::new(),
            live_workers: AtomicUsize::new(0),
            terminated: AtomicBool::new(false),
            stop_emitted: Mutex::new(false),
            stop_signal: Condvar::new(),
            total_added: AtomicU64::new(0),
            total_finished: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        });

        Ok(Self {
            workers: Mutex::new(Vec::with_capacity(config.thread_count)),
            config,
            inner,
            lifecycle: ReentrantMutex::new(()),
            initialized: AtomicBool::new(false),
            stop_deferred: AtomicBool::new(false),
        })
    }

    /// Executor name, used as the event sender.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration this executor was built with.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Registers an observer for lifecycle events.
    pub fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) -> SubscriptionId {
        self.inner.events.subscribe(observer)
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.events.len()
    }

    /// Stores the pipelines and starts the worker threads.
    ///
    /// Only the first call has an effect; later calls, and calls after
    /// [`stop`](Self::stop), return `Ok(())` without doing anything.
    pub fn initialize(&self, pipelines: Vec<PipelineDefinition>) -> Result<(), ExecutorError> {
        let _guard = self.lifecycle.lock();
        if self.inner.terminated.load(Ordering::SeqCst)
            || self.initialized.swap(true, Ordering::SeqCst)
        {
            debug!(executor = %self.inner.name, "Executor already initialized");
            return Ok(());
        }

        let pipeline_names: Vec<String> =
            pipelines.iter().map(|p| p.name().to_string()).collect();
        // Cannot already be set: guarded by `initialized`.
        let _ = self.inner.pipelines.set(pipelines);

        // Held by this call so no worker exit can emit `Stop` before
        // `initialize` is done with the queue.
        self.inner.live_workers.fetch_add(1, Ordering::SeqCst);
        let mut workers = self.workers.lock();
        for index in 0..self.config.thread_count {
            let inner = Arc::clone(&self.inner);
            self.inner.live_workers.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{}", self.inner.name, index))
                .spawn(move || inner.worker_loop());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    self.inner.live_workers.fetch_sub(1, Ordering::SeqCst);
                    error!(
                        executor = %self.inner.name,
                        "Failed to spawn worker {}: {}", index, e
                    );
                    self.inner.terminated.store(true, Ordering::SeqCst);
                    self.inner.queue.close();
                    for handle in workers.drain(..) {
                        let _ = handle.join();
                    }
                    drop(workers);
                    self.inner.queue.wait_admissions(admitting());
                    self.inner.abandon_pending("worker threads could not be started");
                    self.inner.release_slot();
                    return Err(ExecutorError::Spawn(e));
                }
            }
        }
        drop(workers);
        self.inner.release_slot();

        info!(
            executor = %self.inner.name,
            threads = self.config.thread_count,
            pipelines = ?pipeline_names,
            abort_pipeline_on_error = self.inner.abort_pipeline_on_error,
            die_on_exception = self.inner.die_on_exception,
            "Executor initialized"
        );
        self.inner.emit(LifecycleEvent::new(LifecycleEventKind::Initialize));
        self.inner.queue.start();
        Ok(())
    }

    /// Submits a source for processing.
    ///
    /// Returns false once the executor has been stopped or has died. Never
    /// blocks on job execution; the outcome is reported through events.
    /// `SourceAdded` is delivered before the job can be claimed, so it
    /// always precedes the job's other events.
    pub fn add(&self, source: SourceHandle) -> bool {
        if !self.inner.queue.reserve() {
            metrics::JOBS_REJECTED.inc();
            warn!(
                executor = %self.inner.name,
                source = source.name(),
                "Executor not accepting work, source rejected"
            );
            return false;
        }

        let job = Job::new(source);
        self.inner.total_added.fetch_add(1, Ordering::Relaxed);
        metrics::JOBS_ADDED.inc();
        debug!(
            executor = %self.inner.name,
            job_id = %job.id,
            source = job.source.name(),
            "Source added"
        );

        ADMITTING.with(|depth| depth.set(depth.get() + 1));
        self.inner.emit(LifecycleEvent::for_job(
            LifecycleEventKind::SourceAdded,
            &job.source,
            job.id,
        ));
        ADMITTING.with(|depth| depth.set(depth.get() - 1));
        self.inner.queue.commit(job);

        if admitting() == 0 && self.stop_deferred.swap(false, Ordering::SeqCst) {
            let _guard = self.lifecycle.lock();
            self.finish_unstarted();
        }
        true
    }

    /// Stops accepting work, waits for queued and in-flight jobs to finish,
    /// joins the workers and returns once `Stop` has been emitted.
    ///
    /// Idempotent and safe to call from any observer. The executor cannot be
    /// restarted afterwards. On an executor that was never initialized,
    /// accepted sources are dropped with a `SourceExecutionFailed` each.
    ///
    /// From a worker thread or a `SourceAdded` callback it closes admission
    /// and returns without waiting; `Stop` follows once the remaining jobs
    /// are done.
    pub fn stop(&self) {
        let workers = {
            let _guard = self.lifecycle.lock();
            self.inner.terminated.store(true, Ordering::SeqCst);
            if self.inner.queue.shutdown() {
                info!(executor = %self.inner.name, "Stopping executor");
            }

            if self.inner.is_current_worker() {
                debug!(
                    executor = %self.inner.name,
                    "stop() called from a worker thread, not waiting for workers"
                );
                return;
            }

            if admitting() > 0 {
                if !self.initialized.load(Ordering::SeqCst) {
                    self.stop_deferred.store(true, Ordering::SeqCst);
                }
                debug!(
                    executor = %self.inner.name,
                    "stop() called while a source is being added, finishing later"
                );
                return;
            }

            if !self.initialized.load(Ordering::SeqCst) {
                self.finish_unstarted();
                return;
            }
            std::mem::take(&mut *self.workers.lock())
        };

        for handle in workers {
            if handle.join().is_err() {
                error!(executor = %self.inner.name, "Worker thread panicked");
            }
        }
        // The last worker to exit emits `Stop`.
        self.inner.wait_stopped();
    }

    /// Drops whatever was queued before any worker existed and emits `Stop`.
    /// Caller holds the lifecycle lock.
    fn finish_unstarted(&self) {
        self.inner.queue.close();
        self.inner.queue.wait_admissions(admitting());
        self.inner.abandon_pending("executor stopped before it was initialized");
        self.inner.emit_stop();
    }

    /// Whether `add` currently accepts work.
    pub fn is_accepting(&self) -> bool {
        self.inner.queue.is_accepting()
    }

    /// Current executor status.
    pub fn status(&self) -> ExecutorStatus {
        ExecutorStatus {
            name: self.inner.name.clone(),
            running: self.inner.queue.is_running(),
            accepting: self.inner.queue.is_accepting(),
            worker_count: self.inner.live_workers.load(Ordering::SeqCst),
            pending: self.inner.queue.pending_len(),
            in_flight: self.inner.queue.in_flight_len(),
            total_added: self.inner.total_added.load(Ordering::Relaxed),
            total_finished: self.inner.total_finished.load(Ordering::Relaxed),
            total_failed: self.inner.total_failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        let has_workers = !self.workers.lock().is_empty();
        if has_workers || self.inner.queue.pending_len() > 0 {
            self.stop();
        }
    }
}

impl ExecutorInner {
    fn emit(&self, event: LifecycleEvent) {
        self.events.emit(&self.name, event);
    }

    /// Emits `Stop` exactly once, whoever gets here first.
    fn emit_stop(&self) {
        let mut emitted = self.stop_emitted.lock();
        if *emitted {
            return;
        }
        *emitted = true;
        drop(emitted);
        self.stop_signal.notify_all();

        info!(executor = %self.name, "Executor stopped");
        self.emit(LifecycleEvent::new(LifecycleEventKind::Stop));
    }

    /// Gives up one live-worker slot; whoever gives up the last one emits
    /// `Stop`.
    fn release_slot(&self) -> usize {
        let remaining = self.live_workers.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            self.emit_stop();
        }
        remaining
    }

    fn wait_stopped(&self) {
        let mut emitted = self.stop_emitted.lock();
        while !*emitted {
            self.stop_signal.wait(&mut emitted);
        }
    }

    fn is_current_worker(&self) -> bool {
        WORKER_OF.with(Cell::get) == self as *const Self as usize
    }

    fn pipelines(&self) -> &[PipelineDefinition] {
        self.pipelines.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reports every job still queued as failed and forgets it.
    fn abandon_pending(&self, reason: &str) {
        for job in self.queue.discard_pending() {
            self.total_failed.fetch_add(1, Ordering::Relaxed);
            metrics::PIPELINE_FAILURES
                .with_label_values(&["abandoned"])
                .inc();
            warn!(
                executor = %self.name,
                job_id = %job.id,
                source = job.source.name(),
                "Job dropped: {}", reason
            );
            self.emit(
                LifecycleEvent::for_job(
                    LifecycleEventKind::SourceExecutionFailed,
                    &job.source,
                    job.id,
                )
                .with_failure(None, reason),
            );
        }
    }

    fn worker_loop(&self) {
        WORKER_OF.with(|worker| worker.set(self as *const Self as usize));
        let _exit = WorkerExit(self);
        debug!(executor = %self.name, "Worker started");
        while let Some(job) = self.queue.claim() {
            metrics::JOBS_IN_FLIGHT.inc();
            let outcome = catch_unwind(AssertUnwindSafe(|| self.run_job(&job)));
            if let Err(panic) = outcome {
                error!(
                    executor = %self.name,
                    job_id = %job.id,
                    "Job panicked outside a pipeline: {}",
                    panic_message(&panic)
                );
            }
            metrics::JOBS_IN_FLIGHT.dec();
            self.queue.release(job.id);
        }
    }

    fn run_job(&self, job: &Job) {
        let started = Instant::now();
        metrics::JOBS_STARTED.inc();
        debug!(
            executor = %self.name,
            job_id = %job.id,
            source = job.source.name(),
            "Job started"
        );
        self.emit(LifecycleEvent::for_job(
            LifecycleEventKind::SourceExecutionStart,
            &job.source,
            job.id,
        ));

        let mut failures = 0usize;
        let mut current = Arc::clone(&job.source);
        let init = match catch_unwind(AssertUnwindSafe(|| job.source.init())) {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(panic) => Err(format!("source init panicked: {}", panic_message(&panic))),
        };

        if let Err(message) = init {
            failures += 1;
            self.fail(job, None, &current, message);
        } else {
            for definition in self.pipelines() {
                let timer = Instant::now();
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    definition.resolve().execute(Arc::clone(&current))
                }));
                let result = match outcome {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(panic) => Err(format!("pipeline panicked: {}", panic_message(&panic))),
                };

                match result {
                    Ok(next) => {
                        metrics::PIPELINE_DURATION
                            .with_label_values(&[definition.name(), "success"])
                            .observe(timer.elapsed().as_secs_f64());
                        current = next;
                    }
                    Err(message) => {
                        metrics::PIPELINE_DURATION
                            .with_label_values(&[definition.name(), "failed"])
                            .observe(timer.elapsed().as_secs_f64());
                        failures += 1;
                        self.fail(job, Some(definition.name()), &current, message);
                        if self.abort_pipeline_on_error {
                            debug!(
                                executor = %self.name,
                                job_id = %job.id,
                                "Skipping remaining pipelines after failure"
                            );
                            break;
                        }
                    }
                }
            }
        }

        if failures == 0 {
            self.total_finished.fetch_add(1, Ordering::Relaxed);
            metrics::JOBS_FINISHED.inc();
            debug!(
                executor = %self.name,
                job_id = %job.id,
                source = job.source.name(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Job finished"
            );
            self.emit(
                LifecycleEvent::for_job(
                    LifecycleEventKind::SourceExecutionFinished,
                    &job.source,
                    job.id,
                )
                .with_output(&current),
            );
        }
    }

    /// Records a failed pipeline run (or failed source init when `pipeline`
    /// is `None`) and applies the die policy before anyone hears about it.
    fn fail(&self, job: &Job, pipeline: Option<&str>, current: &SourceHandle, message: String) {
        if self.die_on_exception {
            self.die();
        }

        self.total_failed.fetch_add(1, Ordering::Relaxed);
        metrics::PIPELINE_FAILURES
            .with_label_values(&[pipeline.unwrap_or("init")])
            .inc();
        warn!(
            executor = %self.name,
            job_id = %job.id,
            source = job.source.name(),
            pipeline = pipeline.unwrap_or("init"),
            "Job failed: {}", message
        );
        self.emit(
            LifecycleEvent::for_job(
                LifecycleEventKind::SourceExecutionFailed,
                &job.source,
                job.id,
            )
            .with_failure(pipeline, message)
            .with_output(current),
        );
    }

    /// Stops admission from inside a worker. Workers drain and exit; the
    /// last one out emits `Stop`.
    fn die(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        if self.queue.shutdown() {
            error!(executor = %self.name, "Job failed with die_on_exception set, shutting down");
        }
    }
}

/// Worker bookkeeping that must run even if the worker loop unwinds.
struct WorkerExit<'a>(&'a ExecutorInner);

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        let remaining = self.0.release_slot();
        debug!(executor = %self.0.name, remaining, "Worker exited");
    }
}
