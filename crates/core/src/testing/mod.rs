//! Test doubles for executor and pipeline tests.
//!
//! Everything here is synchronous and thread-safe so it can be handed to
//! worker threads directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediaflow_core::testing::{MemorySource, RecordingObserver, ConcurrencyProbe};
//!
//! let recorder = Arc::new(RecordingObserver::new());
//! executor.subscribe(recorder.clone());
//! executor.add(MemorySource::new("a").into_handle());
//!
//! assert!(recorder.wait_for_count(LifecycleEventKind::SourceExecutionFinished, 1, timeout));
//! ```

mod observer;
mod processors;
mod source;

pub use observer::{RecordedEvent, RecordingObserver};
pub use processors::{delay_processor, failing_processor, ConcurrencyProbe};
pub use source::MemorySource;
