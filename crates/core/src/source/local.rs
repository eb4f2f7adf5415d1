//! Sources backed by a file on the local filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::SourceError;
use super::traits::{FileSource, SourceHandle};

/// A file on disk.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    origin: Option<String>,
}

impl LocalFile {
    /// Creates a source for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            path,
            name,
            origin: None,
        }
    }

    /// Sets where the file came from.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Wraps the file in a shareable handle.
    pub fn into_handle(self) -> SourceHandle {
        Arc::new(self)
    }

    /// Path of the file.
    pub fn file_path(&self) -> &Path {
        &self.path
    }
}

impl FileSource for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    fn init(&self) -> Result<(), SourceError> {
        if !self.path.exists() {
            return Err(SourceError::NotFound {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}
