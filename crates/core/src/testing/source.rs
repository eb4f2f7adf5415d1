//! In-memory source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::source::{FileSource, SourceError, SourceHandle};

/// A source that never touches the filesystem and counts hook calls.
#[derive(Debug, Default)]
pub struct MemorySource {
    name: String,
    origin: Option<String>,
    init_error: Option<String>,
    init_panic: Option<String>,
    inits: AtomicUsize,
    begins: AtomicUsize,
    ends: AtomicUsize,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Makes `init` fail with the given message.
    pub fn with_init_error(mut self, message: impl Into<String>) -> Self {
        self.init_error = Some(message.into());
        self
    }

    /// Makes `init` panic with the given message.
    pub fn with_init_panic(mut self, message: impl Into<String>) -> Self {
        self.init_panic = Some(message.into());
        self
    }

    pub fn into_handle(self) -> SourceHandle {
        Arc::new(self)
    }

    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn begin_count(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn end_count(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }
}

impl FileSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    fn init(&self) -> Result<(), SourceError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.init_panic {
            panic!("{}", message);
        }
        match &self.init_error {
            Some(message) => Err(SourceError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn begin_execute(&self) {
        self.begins.fetch_add(1, Ordering::SeqCst);
    }

    fn end_execute(&self) {
        self.ends.fetch_add(1, Ordering::SeqCst);
    }
}
