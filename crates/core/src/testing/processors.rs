//! Processors for exercising executor behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::pipeline::{Processor, ProcessorError};
use crate::processors::FnProcessor;
use crate::source::SourceHandle;

/// A processor that always fails with `message`.
pub fn failing_processor(name: &str, message: &str) -> FnProcessor {
    let message = message.to_string();
    FnProcessor::new(name, move |_| Err(ProcessorError::Failed(message.clone())))
}

/// A processor that sleeps for `delay` and passes the source through.
pub fn delay_processor(delay: Duration) -> FnProcessor {
    FnProcessor::new("delay", move |source| {
        thread::sleep(delay);
        Ok(source)
    })
}

#[derive(Debug, Default)]
struct ProbeState {
    current: AtomicUsize,
    max: AtomicUsize,
    calls: AtomicUsize,
    // Active runs per source name, plus the names seen running twice at once.
    active: Mutex<HashMap<String, usize>>,
    overlaps: Mutex<Vec<String>>,
    processed: Mutex<Vec<String>>,
}

/// Processor that holds each source for a fixed delay and records how many
/// sources were inside it at the same time.
///
/// Clones share their counters, so one clone can go into a pipeline while
/// the test keeps another.
#[derive(Debug, Clone)]
pub struct ConcurrencyProbe {
    delay: Duration,
    state: Arc<ProbeState>,
}

impl ConcurrencyProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(ProbeState::default()),
        }
    }

    /// Highest number of sources seen inside the probe at once.
    pub fn max_concurrent(&self) -> usize {
        self.state.max.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Names of sources that were inside the probe twice at the same time.
    pub fn overlaps(&self) -> Vec<String> {
        self.state.overlaps.lock().clone()
    }

    /// Source names in the order they entered the probe.
    pub fn processed(&self) -> Vec<String> {
        self.state.processed.lock().clone()
    }
}

impl Processor for ConcurrencyProbe {
    fn name(&self) -> &str {
        "probe"
    }

    fn process(&self, source: SourceHandle) -> Result<SourceHandle, ProcessorError> {
        let name = source.name().to_string();
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.processed.lock().push(name.clone());
        {
            let mut active = self.state.active.lock();
            let runs = active.entry(name.clone()).or_insert(0);
            *runs += 1;
            if *runs > 1 {
                self.state.overlaps.lock().push(name.clone());
            }
        }

        let now = self.state.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max.fetch_max(now, Ordering::SeqCst);

        thread::sleep(self.delay);

        self.state.current.fetch_sub(1, Ordering::SeqCst);
        if let Some(runs) = self.state.active.lock().get_mut(&name) {
            *runs -= 1;
        }
        Ok(source)
    }
}
