//! Loading namespaces and unit names.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashSet;

use crate::error::{Error, Result};

static NEXT_NAMESPACE: AtomicU64 = AtomicU64::new(1);

/// Identity of a loading namespace, used to compare installed contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(u64);

impl NamespaceId {
    /// Allocate a process-unique id.
    pub fn fresh() -> Self {
        Self(NEXT_NAMESPACE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ns_{}", self.0)
    }
}

/// Generated name of one execution unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitName(String);

impl UnitName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UnitName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UnitName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Registry of the units currently loaded under one naming scheme.
///
/// Names come from a monotonic counter that is never reset, so a generated
/// name is never handed out twice for the lifetime of the namespace.
pub struct LoadingNamespace {
    id: NamespaceId,
    prefix: String,
    counter: AtomicU64,
    live: Mutex<FxHashSet<UnitName>>,
}

impl LoadingNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            id: NamespaceId::fresh(),
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
            live: Mutex::new(FxHashSet::default()),
        }
    }

    pub fn id(&self) -> NamespaceId {
        self.id
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Produce a name not issued before by this namespace.
    pub fn next_name(&self) -> UnitName {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        UnitName(format!("{}{}", self.prefix, n))
    }

    /// Number of units currently registered.
    pub fn loaded_count(&self) -> usize {
        self.live().len()
    }

    pub fn is_loaded(&self, name: &UnitName) -> bool {
        self.live().contains(name)
    }

    pub(crate) fn register(&self, name: &UnitName) -> Result<()> {
        if !self.live().insert(name.clone()) {
            return Err(Error::NameCollision(name.clone()));
        }
        Ok(())
    }

    pub(crate) fn unregister(&self, name: &UnitName) {
        self.live().remove(name);
    }

    fn live(&self) -> std::sync::MutexGuard<'_, FxHashSet<UnitName>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LoadingNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingNamespace")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .field("loaded", &self.loaded_count())
            .finish()
    }
}
