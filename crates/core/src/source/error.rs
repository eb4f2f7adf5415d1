//! Error types for file sources.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a source's lifecycle hooks.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file backing the source does not exist.
    #[error("Source file not found: {path}")]
    NotFound { path: PathBuf },

    /// The source cannot be used right now.
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}
