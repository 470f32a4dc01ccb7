//! Error types for lumen-core.

use thiserror::Error;

use crate::load::{CompileError, UnitName};
use crate::session::SessionId;

/// Result type for lumen-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lumen-core.
///
/// None of these escape [`ScriptEngine::execute`](crate::ScriptEngine::execute):
/// they are folded into an [`ExecutionOutcome`](crate::ExecutionOutcome) at the
/// classifier boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Source text failed to compile. The run never started.
    #[error("compilation failed: {0}")]
    Compile(#[from] CompileError),

    /// A run was started on a worker that already has one in flight.
    #[error("worker already has an execution in flight")]
    WorkerBusy,

    /// A unit name was registered twice in the same loading namespace.
    #[error("unit name already registered: '{0}'")]
    NameCollision(UnitName),

    /// The session registry could not resolve the session's shared state.
    #[error("shared state unavailable for session {session}: {message}")]
    SessionState { session: SessionId, message: String },

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error (config files, worker thread spawn).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-side plumbing fault.
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a fault in the engine rather than in user code.
    pub fn is_internal(&self) -> bool {
        !matches!(self, Error::Compile(_))
    }
}
