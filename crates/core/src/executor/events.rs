//! Lifecycle events and their observers.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::source::SourceHandle;

use super::types::panic_message;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    Initialize,
    SourceAdded,
    SourceExecutionStart,
    SourceExecutionFinished,
    SourceExecutionFailed,
    Stop,
}

impl LifecycleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::SourceAdded => "source_added",
            Self::SourceExecutionStart => "source_execution_start",
            Self::SourceExecutionFinished => "source_execution_finished",
            Self::SourceExecutionFailed => "source_execution_failed",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle notification.
///
/// Job events carry the source handle that was passed to `add`, even when a
/// pipeline replaced it on the way.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,
    pub source: Option<SourceHandle>,
    pub job_id: Option<Uuid>,
    /// Pipeline that failed (`SourceExecutionFailed` only).
    pub pipeline: Option<String>,
    /// Failure message (`SourceExecutionFailed` only).
    pub error: Option<String>,
    /// Source the job had reached when it finished or failed. Differs from
    /// `source` when a processor replaced it.
    pub output: Option<SourceHandle>,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Creates an event without a source.
    pub fn new(kind: LifecycleEventKind) -> Self {
        Self {
            kind,
            source: None,
            job_id: None,
            pipeline: None,
            error: None,
            output: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates an event about a job.
    pub fn for_job(kind: LifecycleEventKind, source: &SourceHandle, job_id: Uuid) -> Self {
        Self {
            source: Some(Arc::clone(source)),
            job_id: Some(job_id),
            ..Self::new(kind)
        }
    }

    /// Attaches a failure.
    pub fn with_failure(mut self, pipeline: Option<&str>, error: impl Into<String>) -> Self {
        self.pipeline = pipeline.map(str::to_string);
        self.error = Some(error.into());
        self
    }

    /// Attaches the source the job ended with.
    pub fn with_output(mut self, output: &SourceHandle) -> Self {
        self.output = Some(Arc::clone(output));
        self
    }

    /// Name of the source, if the event has one.
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.name())
    }
}

/// Receives lifecycle events.
///
/// Called synchronously on the thread that emitted the event, without any
/// executor lock held. A panicking observer is logged and skipped; the
/// remaining observers still get the event.
pub trait LifecycleObserver: Send + Sync {
    fn on_event(&self, sender: &str, event: &LifecycleEvent);
}

impl<F> LifecycleObserver for F
where
    F: Fn(&str, &LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, sender: &str, event: &LifecycleEvent) {
        self(sender, event)
    }
}

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer registry with snapshot-then-deliver emission.
#[derive(Default)]
pub(crate) struct EventBus {
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn LifecycleObserver>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub(crate) fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub(crate) fn emit(&self, sender: &str, event: LifecycleEvent) {
        let observers: Vec<Arc<dyn LifecycleObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        tracing::trace!(
            executor = sender,
            event = %event.kind,
            source = event.source_name(),
            observers = observers.len(),
            "Emitting lifecycle event"
        );
        for observer in observers {
            let delivered = catch_unwind(AssertUnwindSafe(|| observer.on_event(sender, &event)));
            if let Err(panic) = delivered {
                tracing::error!(
                    executor = sender,
                    event = %event.kind,
                    "Observer panicked: {}",
                    panic_message(&panic)
                );
            }
        }
    }
}
