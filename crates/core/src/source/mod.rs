//! File sources: the opaque handles the executor schedules.
//!
//! A source is anything that can be pushed through a pipeline: a file already
//! on disk, or something that will only get a path once a processor has
//! fetched it. The executor never looks inside a source; it only uses the
//! identity exposed here (through a [`SourceComparer`](crate::comparer::SourceComparer))
//! and the lifecycle hooks.

mod error;
mod local;
mod traits;

pub use error::SourceError;
pub use local::LocalFile;
pub use traits::{FileSource, SourceHandle};
