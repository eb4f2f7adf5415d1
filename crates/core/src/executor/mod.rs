//! Multi-threaded job executor.
//!
//! The executor owns a fixed pool of OS worker threads, a queue of pending
//! jobs and the set of jobs currently in flight. Each job is a
//! [`SourceHandle`](crate::source::SourceHandle) that runs through every
//! registered pipeline, in registration order, on a single worker.
//!
//! Two jobs whose sources are equal under the configured
//! [`SourceComparer`](crate::comparer::SourceComparer) never run at the same
//! time: a worker only claims a pending job that conflicts with nothing in
//! flight, and otherwise waits until a job is released.
//!
//! Failures are reported through [`LifecycleEvent`]s only. Depending on
//! [`ExecutorConfig`], a failing pipeline either lets the job continue with
//! the next pipeline, aborts the rest of the job, or takes the whole
//! executor down.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mediaflow_core::{Executor, ExecutorConfig, LocalFile, Pipeline, LogProcessor};
//!
//! let executor = Executor::new(ExecutorConfig::default().with_thread_count(4))?;
//! executor.subscribe(Arc::new(|sender: &str, event: &LifecycleEvent| {
//!     println!("{}: {:?}", sender, event.kind);
//! }));
//! executor.initialize(vec![Pipeline::new("log").with_processor(LogProcessor).into()])?;
//!
//! executor.add(LocalFile::new("/incoming/track.mp3").into_handle());
//! executor.stop();
//! ```

mod config;
mod events;
mod queue;
mod runner;
mod types;

pub use config::ExecutorConfig;
pub use events::{LifecycleEvent, LifecycleEventKind, LifecycleObserver, SubscriptionId};
pub use runner::Executor;
pub use types::{ExecutorError, ExecutorStatus};
