//! Recording lifecycle observer.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::executor::{LifecycleEvent, LifecycleEventKind, LifecycleObserver};

/// An event together with the name of the executor that sent it.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub sender: String,
    pub event: LifecycleEvent,
}

/// Observer that keeps every event it receives, in delivery order.
///
/// The `wait_*` methods block the calling thread until a condition holds or
/// the timeout expires, so tests never sleep for a fixed time.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RecordedEvent>>,
    changed: Condvar,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().iter().map(|r| r.event.clone()).collect()
    }

    /// All recorded events with their sender.
    pub fn recorded(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<LifecycleEventKind> {
        self.events.lock().iter().map(|r| r.event.kind).collect()
    }

    pub fn events_of(&self, kind: LifecycleEventKind) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .iter()
            .filter(|r| r.event.kind == kind)
            .map(|r| r.event.clone())
            .collect()
    }

    pub fn count(&self, kind: LifecycleEventKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|r| r.event.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Waits until `predicate` holds for the recorded events.
    /// Returns false on timeout.
    pub fn wait_for<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&[RecordedEvent]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();
        while !predicate(&events) {
            if self.changed.wait_until(&mut events, deadline).timed_out() {
                return predicate(&events);
            }
        }
        true
    }

    /// Waits until at least `n` events of `kind` have been recorded.
    pub fn wait_for_count(&self, kind: LifecycleEventKind, n: usize, timeout: Duration) -> bool {
        self.wait_for(timeout, |events| {
            events.iter().filter(|r| r.event.kind == kind).count() >= n
        })
    }
}

impl LifecycleObserver for RecordingObserver {
    fn on_event(&self, sender: &str, event: &LifecycleEvent) {
        self.events.lock().push(RecordedEvent {
            sender: sender.to_string(),
            event: event.clone(),
        });
        self.changed.notify_all();
    }
}
