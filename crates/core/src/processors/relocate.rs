//! Move files into a directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::require_path;
use crate::pipeline::{Processor, ProcessorError};
use crate::source::{LocalFile, SourceHandle};

/// Moves each file into `dest_dir`, creating the directory when needed.
///
/// Falls back to copy + delete when source and destination are on different
/// filesystems.
#[derive(Debug, Clone)]
pub struct MoveProcessor {
    dest_dir: PathBuf,
    overwrite: bool,
}

impl MoveProcessor {
    /// Creates a move processor.
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            overwrite: false,
        }
    }

    /// Allows replacing existing files at the destination.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn io_error(path: &Path, e: std::io::Error) -> ProcessorError {
        ProcessorError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

impl Processor for MoveProcessor {
    fn name(&self) -> &str {
        "move"
    }

    fn process(&self, source: SourceHandle) -> Result<SourceHandle, ProcessorError> {
        let path = require_path(&source, self.name())?;
        let file_name = path
            .file_name()
            .ok_or_else(|| ProcessorError::InvalidSource(format!("{} has no file name", path.display())))?;
        let target = self.dest_dir.join(file_name);

        if target == path {
            return Ok(source);
        }
        if target.exists() && !self.overwrite {
            return Err(ProcessorError::DestinationExists { path: target });
        }

        std::fs::create_dir_all(&self.dest_dir).map_err(|e| Self::io_error(&self.dest_dir, e))?;

        match std::fs::rename(path, &target) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                std::fs::copy(path, &target).map_err(|e| Self::io_error(&target, e))?;
                std::fs::remove_file(path).map_err(|e| Self::io_error(path, e))?;
            }
            Err(e) => return Err(Self::io_error(path, e)),
        }
        debug!(from = %path.display(), to = %target.display(), "Moved file");

        let mut moved = LocalFile::new(&target);
        if let Some(origin) = source.origin() {
            moved = moved.with_origin(origin);
        }
        Ok(moved.into_handle())
    }
}
