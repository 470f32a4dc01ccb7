//! Session-scoped state the engine borrows for a run.
//!
//! A session owns two things the engine touches:
//! - its [`SessionBinding`], the variable scope that persists across submissions
//! - its [`SharedState`], a mutable map bound into every run under a reserved name
//!
//! In production the shared state is resolved through a [`SessionRegistry`],
//! which stands in for the session client that lives outside this crate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use rhai::{Dynamic, Map, Scope};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;

/// Unique identifier for an interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session_{}", self.0.simple())
    }
}

/// Mutable variable environment shared by every submission of one session.
///
/// Cloning the binding clones the handle, not the variables. The engine locks
/// it for the duration of one run; the session's single-flight queue is what
/// keeps two runs from contending for it.
#[derive(Clone, Default)]
pub struct SessionBinding {
    scope: Arc<Mutex<Scope<'static>>>,
}

impl SessionBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a variable's current value.
    pub fn get(&self, name: &str) -> Option<Dynamic> {
        self.lock().get_value::<Dynamic>(name)
    }

    /// Set a variable, declaring it if absent.
    pub fn set(&self, name: &str, value: impl Into<Dynamic>) {
        let value: Dynamic = value.into();
        self.lock().set_value(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    /// Variable names in declaration order, without shadowed duplicates.
    pub fn names(&self) -> Vec<String> {
        let scope = self.lock();
        let mut names: Vec<String> = Vec::new();
        for (name, _, _) in scope.iter() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Number of scope entries, counting shadowed ones.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Lock the scope for a run.
    ///
    /// A run that panicked leaves the scope in whatever state the script had
    /// reached, which is the same state a failed run leaves behind, so a
    /// poisoned lock is recovered rather than propagated.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Scope<'static>> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop shadowed entries, keeping the latest declaration of each name.
///
/// Every `let` a run makes pushes a new entry, so a session that re-declares
/// the same variable would otherwise grow its scope on every submission.
pub(crate) fn compact_scope(scope: &mut Scope<'static>) {
    let entries: Vec<(String, bool, Dynamic)> = scope
        .iter_raw()
        .map(|(name, constant, value)| (name.to_string(), constant, value.clone()))
        .collect();

    let mut seen = FxHashSet::default();
    let mut kept: Vec<_> = entries
        .into_iter()
        .rev()
        .filter(|(name, _, _)| seen.insert(name.clone()))
        .collect();
    if kept.len() == scope.len() {
        return;
    }
    kept.reverse();

    scope.clear();
    for (name, constant, value) in kept {
        if constant {
            scope.push_constant_dynamic(name, value);
        } else {
            scope.push_dynamic(name, value);
        }
    }
}

impl std::fmt::Debug for SessionBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBinding")
            .field("names", &self.names())
            .finish()
    }
}

/// The session's shared-state handle: a map shared by reference.
///
/// Clones observe each other's writes, and so does the running script when
/// the handle is bound into its scope.
#[derive(Debug, Clone)]
pub struct SharedState(Dynamic);

impl SharedState {
    /// A fresh, empty, private map.
    pub fn new() -> Self {
        Self(Dynamic::from_map(Map::new()).into_shared())
    }

    pub fn get(&self, key: &str) -> Option<Dynamic> {
        self.0.read_lock::<Map>().and_then(|map| map.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: impl Into<Dynamic>) {
        // The clone shares the lock with every other handle.
        let mut handle = self.0.clone();
        if let Some(mut map) = handle.write_lock::<Map>() {
            map.insert(key.into(), value.into());
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.0
            .read_lock::<Map>()
            .map(|map| map.keys().map(|k| k.to_string()).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read_lock::<Map>().is_none_or(|map| map.is_empty())
    }

    /// The shared value to bind into a run's scope.
    pub(crate) fn handle(&self) -> Dynamic {
        self.0.clone()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves a session's shared state.
///
/// Called once per execution when the engine runs in production mode.
pub trait SessionRegistry: Send + Sync {
    fn resolve_binding(&self, session: &SessionId) -> Result<SharedState>;
}

/// Registry that keeps shared state in memory, creating it on first use.
#[derive(Default)]
pub struct InMemoryRegistry {
    sessions: RwLock<FxHashMap<SessionId, SharedState>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a session's shared state. Returns whether it existed.
    pub fn remove(&self, session: &SessionId) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session)
            .is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SessionRegistry for InMemoryRegistry {
    fn resolve_binding(&self, session: &SessionId) -> Result<SharedState> {
        if let Some(state) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
        {
            return Ok(state.clone());
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.entry(*session).or_default().clone())
    }
}
