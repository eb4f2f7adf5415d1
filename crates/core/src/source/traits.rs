//! Trait definitions for the source module.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use super::error::SourceError;

/// Shared handle to a source. Cloning the handle does not clone the source,
/// so reference identity survives being passed between threads.
pub type SourceHandle = Arc<dyn FileSource>;

/// A unit of work that flows through pipelines.
pub trait FileSource: Send + Sync + fmt::Debug {
    /// Display name, usually the file name.
    fn name(&self) -> &str;

    /// Location on disk, if the source has one yet.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Where the source came from (URL, watched directory, ...).
    fn origin(&self) -> Option<&str> {
        None
    }

    /// Prepares the source before the first pipeline touches it.
    fn init(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Called before a pipeline starts working on this source.
    fn begin_execute(&self) {}

    /// Called after a pipeline is done with this source, also on failure.
    fn end_execute(&self) {}
}
