//! Conflict detection between sources.
//!
//! Two jobs conflict when the active comparer says their sources are equal.
//! The executor never runs conflicting jobs at the same time. "The same
//! file" is not always reference equality: a source might be reached through
//! two different handles, or not have a path yet, so the notion is pluggable.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::source::SourceHandle;

/// Decides whether two sources refer to the same resource.
///
/// Implementations must be consistent: sources that are equal must hash to
/// the same value.
pub trait SourceComparer: Send + Sync {
    /// Returns true when `a` and `b` must not be processed concurrently.
    fn equals(&self, a: &SourceHandle, b: &SourceHandle) -> bool;

    /// Hash consistent with [`equals`](Self::equals).
    fn hash(&self, source: &SourceHandle) -> u64;
}

/// Same handle, same source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceComparer;

impl SourceComparer for ReferenceComparer {
    fn equals(&self, a: &SourceHandle, b: &SourceHandle) -> bool {
        Arc::ptr_eq(a, b)
    }

    fn hash(&self, source: &SourceHandle) -> u64 {
        pointer_hash(source)
    }
}

/// Sources with the same file name conflict.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameComparer;

impl SourceComparer for NameComparer {
    fn equals(&self, a: &SourceHandle, b: &SourceHandle) -> bool {
        a.name() == b.name()
    }

    fn hash(&self, source: &SourceHandle) -> u64 {
        value_hash(source.name())
    }
}

/// Sources with the same origin conflict. Sources without an origin fall
/// back to reference equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginComparer;

impl SourceComparer for OriginComparer {
    fn equals(&self, a: &SourceHandle, b: &SourceHandle) -> bool {
        match (a.origin(), b.origin()) {
            (Some(x), Some(y)) => x == y,
            _ => Arc::ptr_eq(a, b),
        }
    }

    fn hash(&self, source: &SourceHandle) -> u64 {
        match source.origin() {
            Some(origin) => value_hash(origin),
            None => pointer_hash(source),
        }
    }
}

/// Every source conflicts with every other one, so jobs run one at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysEqualComparer;

impl SourceComparer for AlwaysEqualComparer {
    fn equals(&self, _a: &SourceHandle, _b: &SourceHandle) -> bool {
        true
    }

    fn hash(&self, _source: &SourceHandle) -> u64 {
        0
    }
}

/// Comparer selection for configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparerKind {
    #[default]
    Reference,
    Name,
    Origin,
    AlwaysEqual,
}

impl ComparerKind {
    /// Instantiates the comparer.
    pub fn build(self) -> Arc<dyn SourceComparer> {
        match self {
            ComparerKind::Reference => Arc::new(ReferenceComparer),
            ComparerKind::Name => Arc::new(NameComparer),
            ComparerKind::Origin => Arc::new(OriginComparer),
            ComparerKind::AlwaysEqual => Arc::new(AlwaysEqualComparer),
        }
    }
}

fn pointer_hash(source: &SourceHandle) -> u64 {
    Arc::as_ptr(source) as *const () as usize as u64
}

fn value_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
