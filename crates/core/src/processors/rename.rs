//! Rename files in place.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::require_path;
use crate::naming::{FileInfo, NamePattern};
use crate::pipeline::{Processor, ProcessorError};
use crate::source::{LocalFile, SourceHandle};

/// Renames a file inside its directory using a [`NamePattern`].
///
/// If the rendered name has no extension the original one is kept. Path
/// separators produced by the pattern are replaced with `_`.
#[derive(Debug)]
pub struct RenameProcessor {
    pattern: NamePattern,
    renamed: AtomicU64,
}

impl RenameProcessor {
    /// Creates a rename processor.
    pub fn new(pattern: NamePattern) -> Self {
        Self {
            pattern,
            renamed: AtomicU64::new(0),
        }
    }

    /// Number of files this instance renamed.
    pub fn renamed(&self) -> u64 {
        self.renamed.load(Ordering::Relaxed)
    }

    fn target_name(&self, source: &SourceHandle, path: &Path) -> Result<String, ProcessorError> {
        let info = FileInfo::from_source(source.as_ref());
        let mut name: String = self
            .pattern
            .render(&info)?
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();

        if name.trim().is_empty() || name == "." || name == ".." {
            return Err(ProcessorError::Failed(format!(
                "pattern '{}' produced an empty name",
                self.pattern.as_str()
            )));
        }
        if Path::new(&name).extension().is_none() {
            if let Some(ext) = path.extension() {
                name.push('.');
                name.push_str(&ext.to_string_lossy());
            }
        }
        Ok(name)
    }
}

impl Processor for RenameProcessor {
    fn name(&self) -> &str {
        "rename"
    }

    fn process(&self, source: SourceHandle) -> Result<SourceHandle, ProcessorError> {
        let path = require_path(&source, self.name())?;
        let name = self.target_name(&source, path)?;
        let target: PathBuf = match path.parent() {
            Some(dir) => dir.join(&name),
            None => PathBuf::from(&name),
        };

        if target == path {
            return Ok(source);
        }
        if target.exists() {
            return Err(ProcessorError::DestinationExists { path: target });
        }

        std::fs::rename(path, &target).map_err(|e| ProcessorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.renamed.fetch_add(1, Ordering::Relaxed);
        debug!(from = %path.display(), to = %target.display(), "Renamed file");

        let mut renamed = LocalFile::new(&target);
        if let Some(origin) = source.origin() {
            renamed = renamed.with_origin(origin);
        }
        Ok(renamed.into_handle())
    }
}
