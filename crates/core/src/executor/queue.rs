//! Pending queue and in-flight set.
//!
//! Both live under one mutex so that "find a pending job that conflicts
//! with nothing in flight, then mark it in flight" is a single atomic step.
//!
//! Admission is two-phase: `reserve` takes a slot while admission is open
//! and `commit` makes the job claimable. Draining workers do not exit while
//! a reserved slot is outstanding, so every admitted job gets run.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use crate::comparer::SourceComparer;
use crate::source::SourceHandle;

/// A submitted source.
#[derive(Debug, Clone)]
pub(crate) struct Job {
    pub id: Uuid,
    pub source: SourceHandle,
}

impl Job {
    pub(crate) fn new(source: SourceHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
        }
    }
}

struct InFlight {
    job_id: Uuid,
    key: u64,
    source: SourceHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Workers wait; nothing is dispatched yet.
    Idle,
    /// Jobs are dispatched as they become claimable.
    Running,
    /// No new jobs; workers finish what is queued, then exit.
    Draining,
    /// Nothing is dispatched anymore; workers exit at once.
    Closed,
}

struct QueueState {
    pending: VecDeque<Job>,
    in_flight: Vec<InFlight>,
    phase: Phase,
    accepting: bool,
    /// Slots handed out by `reserve` and not yet committed.
    admitting: usize,
}

pub(crate) struct JobQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
    comparer: Arc<dyn SourceComparer>,
}

impl JobQueue {
    pub(crate) fn new(comparer: Arc<dyn SourceComparer>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: Vec::new(),
                phase: Phase::Idle,
                accepting: true,
                admitting: 0,
            }),
            changed: Condvar::new(),
            comparer,
        }
    }

    /// Takes an admission slot. Returns false once admission is closed.
    pub(crate) fn reserve(&self) -> bool {
        let mut state = self.state.lock();
        if !state.accepting {
            return false;
        }
        state.admitting += 1;
        true
    }

    /// Queues a job for a slot taken with `reserve`.
    pub(crate) fn commit(&self, job: Job) {
        let mut state = self.state.lock();
        state.admitting = state.admitting.saturating_sub(1);
        state.pending.push_back(job);
        drop(state);
        self.changed.notify_all();
    }

    /// Blocks until every outstanding slot except `own` has been committed.
    pub(crate) fn wait_admissions(&self, own: usize) {
        let mut state = self.state.lock();
        while state.admitting > own {
            self.changed.wait(&mut state);
        }
    }

    /// Blocks until a non-conflicting job can be claimed.
    ///
    /// Returns `None` when the queue is closed, or draining with nothing
    /// left to admit or run, which tells the worker to exit.
    pub(crate) fn claim(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            match state.phase {
                Phase::Idle => {}
                Phase::Closed => return None,
                Phase::Running | Phase::Draining => {
                    let claimable = state.pending.iter().position(|job| {
                        let key = self.comparer.hash(&job.source);
                        !state
                            .in_flight
                            .iter()
                            .any(|f| f.key == key && self.comparer.equals(&f.source, &job.source))
                    });

                    if let Some(job) = claimable.and_then(|idx| state.pending.remove(idx)) {
                        let key = self.comparer.hash(&job.source);
                        state.in_flight.push(InFlight {
                            job_id: job.id,
                            key,
                            source: Arc::clone(&job.source),
                        });
                        return Some(job);
                    }

                    if state.phase == Phase::Draining
                        && state.pending.is_empty()
                        && state.admitting == 0
                    {
                        return None;
                    }
                }
            }
            self.changed.wait(&mut state);
        }
    }

    /// Removes a job from the in-flight set and wakes every waiting worker.
    pub(crate) fn release(&self, job_id: Uuid) {
        let mut state = self.state.lock();
        state.in_flight.retain(|f| f.job_id != job_id);
        drop(state);
        self.changed.notify_all();
    }

    /// Starts dispatching. No effect once draining or closed.
    pub(crate) fn start(&self) {
        let mut state = self.state.lock();
        if state.phase == Phase::Idle {
            state.phase = Phase::Running;
        }
        drop(state);
        self.changed.notify_all();
    }

    /// Closes admission and lets workers drain. Returns true on the first
    /// call that closed admission.
    pub(crate) fn shutdown(&self) -> bool {
        let mut state = self.state.lock();
        let first = state.accepting;
        state.accepting = false;
        if state.phase != Phase::Closed {
            state.phase = Phase::Draining;
        }
        drop(state);
        self.changed.notify_all();
        first
    }

    /// Closes admission and stops dispatch; pending jobs stay queued until
    /// `discard_pending` takes them.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.accepting = false;
        state.phase = Phase::Closed;
        drop(state);
        self.changed.notify_all();
    }

    /// Takes every job that has not been claimed yet.
    pub(crate) fn discard_pending(&self) -> Vec<Job> {
        let mut state = self.state.lock();
        state.pending.drain(..).collect()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.lock().phase == Phase::Running
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.state.lock().accepting
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub(crate) fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }
}
