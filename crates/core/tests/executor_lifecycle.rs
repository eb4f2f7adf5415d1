//! Executor lifecycle integration tests.
//!
//! These tests drive a real executor with in-memory sources and test
//! processors:
//! - Construction and initialization rules
//! - Failure policies (continue, abort pipeline, die)
//! - Conflict exclusion and real parallelism
//! - Terminal state after stop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use mediaflow_core::{
    testing::{
        delay_processor, failing_processor, ConcurrencyProbe, MemorySource, RecordingObserver,
    },
    AlwaysEqualComparer, ComparerKind, Executor, ExecutorConfig, ExecutorError, FnProcessor,
    LifecycleEvent, LifecycleEventKind, Pipeline, PipelineBuilder, PipelineDefinition,
    SourceHandle,
};

const WAIT: Duration = Duration::from_secs(10);

/// Test helper bundling an executor with a recording observer.
struct TestHarness {
    executor: Arc<Executor>,
    recorder: Arc<RecordingObserver>,
}

impl TestHarness {
    fn new(config: ExecutorConfig) -> Self {
        let executor = Executor::new(config).expect("Failed to create executor");
        Self::wrap(executor)
    }

    fn wrap(executor: Executor) -> Self {
        let recorder = Arc::new(RecordingObserver::new());
        executor.subscribe(recorder.clone());
        Self {
            executor: Arc::new(executor),
            recorder,
        }
    }

    fn start(&self, pipelines: Vec<PipelineDefinition>) {
        self.executor
            .initialize(pipelines)
            .expect("Failed to initialize executor");
    }

    fn add(&self, name: &str) -> bool {
        self.executor.add(MemorySource::new(name).into_handle())
    }

    fn count(&self, kind: LifecycleEventKind) -> usize {
        self.recorder.count(kind)
    }

    fn wait_for(&self, kind: LifecycleEventKind, n: usize) {
        assert!(
            self.recorder.wait_for_count(kind, n, WAIT),
            "Timed out waiting for {} x {}",
            n,
            kind
        );
    }
}

fn passthrough(name: &str) -> PipelineDefinition {
    Pipeline::new(name)
        .with_processor(FnProcessor::new("noop", Ok))
        .into()
}

fn failing(name: &str) -> PipelineDefinition {
    Pipeline::new(name)
        .with_processor(failing_processor("boom", "always fails"))
        .into()
}

fn counting(name: &str, counter: &Arc<AtomicUsize>) -> PipelineDefinition {
    let counter = Arc::clone(counter);
    Pipeline::new(name)
        .with_processor(FnProcessor::new("count", move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(s)
        }))
        .into()
}

fn probed(probe: &ConcurrencyProbe) -> PipelineDefinition {
    Pipeline::new("probed").with_processor(probe.clone()).into()
}

// =============================================================================
// Construction and initialization
// =============================================================================

#[test]
fn test_zero_threads_fails_construction() {
    let err = Executor::new(ExecutorConfig::default().with_thread_count(0)).unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidArgument(_)));

    let err = Executor::with_comparer(
        ExecutorConfig::default().with_thread_count(0),
        Arc::new(AlwaysEqualComparer),
    )
    .unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidArgument(_)));
}

#[test]
fn test_initialize_twice_has_no_effect() {
    let harness = TestHarness::new(ExecutorConfig::default().with_thread_count(3));
    harness.start(vec![passthrough("a")]);
    let workers = harness.executor.status().worker_count;

    harness
        .executor
        .initialize(vec![passthrough("a"), passthrough("b")])
        .unwrap();

    assert_eq!(workers, 3);
    assert_eq!(harness.executor.status().worker_count, 3);
    assert_eq!(harness.count(LifecycleEventKind::Initialize), 1);

    // Only the first pipeline list is used.
    assert!(harness.add("x"));
    harness.executor.stop();
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFinished), 1);
}

#[test]
fn test_initialize_after_stop_is_noop() {
    let harness = TestHarness::new(ExecutorConfig::default());
    harness.executor.stop();
    harness.start(vec![passthrough("a")]);

    assert_eq!(harness.count(LifecycleEventKind::Initialize), 0);
    assert_eq!(harness.executor.status().worker_count, 0);
    assert!(!harness.add("x"));
}

#[test]
fn test_events_carry_executor_name() {
    let harness = TestHarness::new(ExecutorConfig::default().with_name("library"));
    harness.start(vec![passthrough("a")]);
    harness.add("x");
    harness.executor.stop();

    let recorded = harness.recorder.recorded();
    assert!(!recorded.is_empty());
    assert!(recorded.iter().all(|r| r.sender == "library"));

    assert_eq!(
        harness.recorder.kinds(),
        vec![
            LifecycleEventKind::Initialize,
            LifecycleEventKind::SourceAdded,
            LifecycleEventKind::SourceExecutionStart,
            LifecycleEventKind::SourceExecutionFinished,
            LifecycleEventKind::Stop,
        ]
    );
}

// =============================================================================
// Failure policies
// =============================================================================

#[test]
fn test_every_failing_pipeline_reports_without_abort() {
    let harness = TestHarness::new(ExecutorConfig::default().with_thread_count(2));
    harness.start(vec![failing("first"), failing("second")]);

    for i in 0..3 {
        assert!(harness.add(&format!("job-{}", i)));
    }
    harness.wait_for(LifecycleEventKind::SourceExecutionFailed, 6);
    harness.executor.stop();

    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFailed), 6);
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFinished), 0);

    let pipelines: Vec<_> = harness
        .recorder
        .events_of(LifecycleEventKind::SourceExecutionFailed)
        .into_iter()
        .filter_map(|e| e.pipeline)
        .collect();
    assert_eq!(pipelines.iter().filter(|p| *p == "first").count(), 3);
    assert_eq!(pipelines.iter().filter(|p| *p == "second").count(), 3);
}

#[test]
fn test_failure_without_abort_runs_later_pipelines() {
    let reached = Arc::new(AtomicUsize::new(0));
    let harness = TestHarness::new(ExecutorConfig::default());
    harness.start(vec![failing("broken"), counting("after", &reached)]);

    harness.add("x");
    harness.executor.stop();

    assert_eq!(reached.load(Ordering::SeqCst), 1);
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFailed), 1);
    // A job with any failure is never reported as finished.
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFinished), 0);
}

#[test]
fn test_abort_skips_remaining_pipelines() {
    let reached = Arc::new(AtomicUsize::new(0));
    let harness = TestHarness::new(
        ExecutorConfig::default()
            .with_thread_count(2)
            .with_abort_pipeline_on_error(true),
    );
    harness.start(vec![failing("broken"), counting("after", &reached)]);

    harness.add("x");
    harness.wait_for(LifecycleEventKind::SourceExecutionFailed, 1);
    harness.executor.stop();

    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFailed), 1);
    assert_eq!(reached.load(Ordering::SeqCst), 0);

    let failed = harness
        .recorder
        .events_of(LifecycleEventKind::SourceExecutionFailed);
    assert_eq!(failed[0].pipeline.as_deref(), Some("broken"));
    assert!(failed[0].error.as_deref().unwrap().contains("always fails"));
}

#[test]
fn test_die_on_exception_rejects_adds_and_stops() {
    let harness = TestHarness::new(
        ExecutorConfig::default()
            .with_thread_count(2)
            .with_die_on_exception(true),
    );

    // The failure observer already sees admission closed.
    let seen_by_observer = Arc::new(AtomicUsize::new(0));
    let weak: Weak<Executor> = Arc::downgrade(&harness.executor);
    let rejected = Arc::clone(&seen_by_observer);
    harness
        .executor
        .subscribe(Arc::new(move |_: &str, event: &LifecycleEvent| {
            if event.kind == LifecycleEventKind::SourceExecutionFailed {
                if let Some(executor) = weak.upgrade() {
                    if !executor.add(MemorySource::new("late").into_handle()) {
                        rejected.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        }));

    harness.start(vec![failing("broken")]);
    assert!(harness.add("x"));

    harness.wait_for(LifecycleEventKind::Stop, 1);
    assert_eq!(seen_by_observer.load(Ordering::SeqCst), 1);
    for i in 0..5 {
        assert!(!harness.add(&format!("after-{}", i)));
    }
    assert!(!harness.executor.is_accepting());

    // An explicit stop afterwards joins but does not emit a second Stop.
    harness.executor.stop();
    assert_eq!(harness.count(LifecycleEventKind::Stop), 1);
    assert_eq!(harness.executor.status().worker_count, 0);
}

#[test]
fn test_queued_jobs_run_after_die() {
    let harness = TestHarness::new(ExecutorConfig::default().with_die_on_exception(true));
    let fail_first = Pipeline::new("picky").with_processor(FnProcessor::new("picky", |s| {
        if s.name() == "bad" {
            Err(mediaflow_core::ProcessorError::Failed("bad input".to_string()))
        } else {
            Ok(s)
        }
    }));

    // Queued before the workers start, so both are pending when "bad" fails.
    assert!(harness.add("bad"));
    assert!(harness.add("good"));
    harness.start(vec![fail_first.into()]);

    harness.wait_for(LifecycleEventKind::Stop, 1);
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFailed), 1);
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFinished), 1);
    assert_eq!(
        harness.recorder.kinds().last(),
        Some(&LifecycleEventKind::Stop)
    );
    harness.executor.stop();
    assert_eq!(harness.count(LifecycleEventKind::Stop), 1);
}

#[test]
fn test_source_init_failure_skips_pipelines() {
    let reached = Arc::new(AtomicUsize::new(0));
    let harness = TestHarness::new(ExecutorConfig::default());
    harness.start(vec![counting("a", &reached), counting("b", &reached)]);

    let source = Arc::new(MemorySource::new("offline").with_init_error("not downloaded"));
    let handle: SourceHandle = source.clone();
    assert!(harness.executor.add(handle));
    harness.executor.stop();

    assert_eq!(source.init_count(), 1);
    assert_eq!(source.begin_count(), 0);
    assert_eq!(reached.load(Ordering::SeqCst), 0);
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFailed), 1);
}

// =============================================================================
// Conflicts and parallelism
// =============================================================================

#[test]
fn test_always_equal_comparer_serializes_jobs() {
    let probe = ConcurrencyProbe::new(Duration::from_millis(20));
    let harness = TestHarness::new(
        ExecutorConfig::default()
            .with_thread_count(4)
            .with_comparer(ComparerKind::AlwaysEqual),
    );
    harness.start(vec![probed(&probe)]);

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let executor = Arc::clone(&harness.executor);
            thread::spawn(move || {
                for i in 0..2 {
                    let name = format!("p{}-{}", p, i);
                    assert!(executor.add(MemorySource::new(name).into_handle()));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    harness.wait_for(LifecycleEventKind::SourceExecutionFinished, 8);
    harness.executor.stop();

    assert_eq!(probe.max_concurrent(), 1);

    // Every Start is closed before the next one opens.
    let mut open = 0;
    for kind in harness.recorder.kinds() {
        match kind {
            LifecycleEventKind::SourceExecutionStart => {
                open += 1;
                assert_eq!(open, 1, "two conflicting jobs ran at once");
            }
            LifecycleEventKind::SourceExecutionFinished
            | LifecycleEventKind::SourceExecutionFailed => open -= 1,
            _ => {}
        }
    }
}

#[test]
fn test_reference_comparer_runs_distinct_sources_in_parallel() {
    let probe = ConcurrencyProbe::new(Duration::from_millis(200));
    let harness = TestHarness::new(ExecutorConfig::default().with_thread_count(2));
    harness.start(vec![probed(&probe)]);

    for i in 0..4 {
        assert!(harness.add(&format!("track-{}", i)));
    }
    harness.wait_for(LifecycleEventKind::SourceExecutionFinished, 4);
    harness.executor.stop();

    assert_eq!(probe.calls(), 4);
    assert!(probe.max_concurrent() >= 2);
}

#[test]
fn test_name_comparer_keeps_same_name_apart() {
    let probe = ConcurrencyProbe::new(Duration::from_millis(30));
    let harness = TestHarness::new(
        ExecutorConfig::default()
            .with_thread_count(4)
            .with_comparer(ComparerKind::Name),
    );
    harness.start(vec![probed(&probe)]);

    for _ in 0..3 {
        assert!(harness.add("album.flac"));
        assert!(harness.add("other.flac"));
    }
    harness.wait_for(LifecycleEventKind::SourceExecutionFinished, 6);
    harness.executor.stop();

    assert!(probe.overlaps().is_empty());
    assert_eq!(probe.calls(), 6);
}

#[test]
fn test_same_source_twice_runs_twice() {
    let harness = TestHarness::new(ExecutorConfig::default());
    harness.start(vec![passthrough("identity")]);

    let source = MemorySource::new("a").into_handle();
    assert!(harness.executor.add(Arc::clone(&source)));
    assert!(harness.executor.add(Arc::clone(&source)));

    harness.wait_for(LifecycleEventKind::SourceExecutionFinished, 2);
    harness.executor.stop();
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFinished), 2);
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFailed), 0);
}

#[test]
fn test_single_thread_failing_pipeline_reports_each_failure() {
    let harness = TestHarness::new(ExecutorConfig::default());
    harness.start(vec![failing("first"), failing("second")]);

    assert!(harness.add("a"));
    harness.executor.stop();

    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFailed), 2);
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFinished), 0);
}

#[test]
fn test_concurrent_producers() {
    let harness = TestHarness::new(ExecutorConfig::default().with_thread_count(4));
    harness.start(vec![
        Pipeline::new("slow")
            .with_processor(delay_processor(Duration::from_millis(1)))
            .into(),
    ]);

    let producers: Vec<_> = (0..8)
        .map(|p| {
            let executor = Arc::clone(&harness.executor);
            thread::spawn(move || {
                (0..25)
                    .filter(|i| {
                        let name = format!("{}-{}", p, i);
                        executor.add(MemorySource::new(name).into_handle())
                    })
                    .count()
            })
        })
        .collect();
    let accepted: usize = producers.into_iter().map(|h| h.join().unwrap()).sum();

    harness.executor.stop();
    assert_eq!(accepted, 200);
    assert_eq!(harness.count(LifecycleEventKind::SourceAdded), 200);
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFinished), 200);
    assert_eq!(harness.executor.status().total_finished, 200);
}

// =============================================================================
// Pipelines and events
// =============================================================================

#[test]
fn test_builder_pipelines_are_built_per_job() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let builder = PipelineBuilder::new("fresh", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Pipeline::new("fresh").with_processor(FnProcessor::new("noop", Ok))
    });

    let harness = TestHarness::new(ExecutorConfig::default().with_thread_count(2));
    harness.start(vec![builder.into()]);
    for i in 0..3 {
        harness.add(&format!("job-{}", i));
    }
    harness.executor.stop();

    assert_eq!(builds.load(Ordering::SeqCst), 3);
}

#[test]
fn test_events_report_the_added_source() {
    let harness = TestHarness::new(ExecutorConfig::default());
    let replace = Pipeline::new("replace").with_processor(FnProcessor::new("swap", |_| {
        Ok(MemorySource::new("replacement").into_handle())
    }));
    harness.start(vec![replace.into()]);

    let original = MemorySource::new("original").into_handle();
    harness.executor.add(Arc::clone(&original));
    harness.executor.stop();

    let events = harness.recorder.events();
    let job_events: Vec<_> = events.iter().filter(|e| e.source.is_some()).collect();
    assert_eq!(job_events.len(), 3);
    for event in &job_events {
        assert!(Arc::ptr_eq(event.source.as_ref().unwrap(), &original));
        assert_eq!(event.job_id, job_events[0].job_id);
    }
}

#[test]
fn test_start_precedes_outcome_for_each_job() {
    let harness = TestHarness::new(ExecutorConfig::default().with_thread_count(3));
    harness.start(vec![
        Pipeline::new("slow")
            .with_processor(delay_processor(Duration::from_millis(5)))
            .into(),
    ]);
    for i in 0..10 {
        harness.add(&format!("job-{}", i));
    }
    harness.executor.stop();

    let events = harness.recorder.events();
    for (idx, event) in events.iter().enumerate() {
        if event.kind == LifecycleEventKind::SourceExecutionFinished {
            let started = events[..idx].iter().any(|e| {
                e.kind == LifecycleEventKind::SourceExecutionStart && e.job_id == event.job_id
            });
            assert!(started, "Finished without Start for {:?}", event.job_id);
        }
    }
}

#[test]
fn test_observer_can_add_from_callback() {
    let harness = TestHarness::new(ExecutorConfig::default().with_thread_count(2));
    let weak = Arc::downgrade(&harness.executor);
    harness
        .executor
        .subscribe(Arc::new(move |_: &str, event: &LifecycleEvent| {
            if event.kind == LifecycleEventKind::SourceExecutionFinished
                && event.source_name() == Some("first")
            {
                if let Some(executor) = weak.upgrade() {
                    executor.add(MemorySource::new("second").into_handle());
                }
            }
        }));
    harness.start(vec![passthrough("a")]);

    harness.add("first");
    harness.wait_for(LifecycleEventKind::SourceExecutionFinished, 2);
    harness.executor.stop();

    let names: Vec<_> = harness
        .recorder
        .events_of(LifecycleEventKind::SourceExecutionFinished)
        .iter()
        .filter_map(|e| e.source_name().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let harness = TestHarness::new(ExecutorConfig::default());
    let extra = Arc::new(RecordingObserver::new());
    let id = harness.executor.subscribe(extra.clone());
    assert_eq!(harness.executor.observer_count(), 2);

    harness.start(vec![passthrough("a")]);
    assert!(harness.executor.unsubscribe(id));
    assert!(!harness.executor.unsubscribe(id));
    harness.add("x");
    harness.executor.stop();

    assert_eq!(extra.kinds(), vec![LifecycleEventKind::Initialize]);
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFinished), 1);
}

// =============================================================================
// Stop
// =============================================================================

#[test]
fn test_stop_is_terminal() {
    let harness = TestHarness::new(ExecutorConfig::default().with_thread_count(2));
    harness.start(vec![passthrough("a")]);
    harness.add("x");

    harness.executor.stop();
    let before = harness.recorder.events().len();
    assert_eq!(
        harness.recorder.kinds().last(),
        Some(&LifecycleEventKind::Stop)
    );

    assert!(!harness.add("y"));
    harness.executor.stop();
    harness.start(vec![passthrough("b")]);

    assert_eq!(harness.recorder.events().len(), before);
    assert_eq!(harness.count(LifecycleEventKind::Stop), 1);
    let status = harness.executor.status();
    assert!(!status.running);
    assert!(!status.accepting);
    assert_eq!(status.total_added, 1);
}

#[test]
fn test_stop_waits_for_queued_jobs() {
    let harness = TestHarness::new(ExecutorConfig::default());
    harness.start(vec![
        Pipeline::new("slow")
            .with_processor(delay_processor(Duration::from_millis(10)))
            .into(),
    ]);
    for i in 0..5 {
        harness.add(&format!("job-{}", i));
    }

    harness.executor.stop();
    assert_eq!(harness.count(LifecycleEventKind::SourceExecutionFinished), 5);
    assert_eq!(harness.executor.status().pending, 0);
    assert_eq!(harness.executor.status().in_flight, 0);
}

#[test]
fn test_adds_racing_stop_never_follow_stop() {
    for _ in 0..20 {
        let harness = TestHarness::new(ExecutorConfig::default().with_thread_count(2));
        harness.start(vec![passthrough("a")]);

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let executor = Arc::clone(&harness.executor);
                thread::spawn(move || {
                    (0..50)
                        .filter(|i| {
                            let name = format!("{}-{}", p, i);
                            executor.add(MemorySource::new(name).into_handle())
                        })
                        .count()
                })
            })
            .collect();
        harness.executor.stop();
        let accepted: usize = producers.into_iter().map(|h| h.join().unwrap()).sum();

        let kinds = harness.recorder.kinds();
        assert_eq!(kinds.last(), Some(&LifecycleEventKind::Stop));
        assert_eq!(harness.count(LifecycleEventKind::Stop), 1);
        assert_eq!(harness.count(LifecycleEventKind::SourceAdded), accepted);
        assert_eq!(
            harness.count(LifecycleEventKind::SourceExecutionFinished),
            accepted
        );
    }
}

#[test]
fn test_stop_before_initialize_reports_queued_sources() {
    let harness = TestHarness::new(ExecutorConfig::default());
    assert!(harness.add("early"));
    harness.executor.stop();

    let failed = harness
        .recorder
        .events_of(LifecycleEventKind::SourceExecutionFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].source_name(), Some("early"));
    assert_eq!(
        harness.recorder.kinds().last(),
        Some(&LifecycleEventKind::Stop)
    );
    assert_eq!(harness.executor.status().pending, 0);
}
