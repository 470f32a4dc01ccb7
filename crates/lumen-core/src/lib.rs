//! Core engine for Lumen notebook sessions.
//!
//! This crate provides:
//! - Unit loading: source text compiled into uniquely named units
//! - Scoped execution contexts with guaranteed restoration
//! - Per-run output capture routed to the submitting session
//! - Outcome classification with sanitized diagnostics
//! - Cross-thread cancellation of in-flight runs

pub mod config;
pub mod error;
pub mod execute;
pub mod load;
pub mod outcome;
pub mod output;
pub mod session;

pub use config::{EngineConfig, Mode};
pub use error::{Error, Result};
pub use execute::{
    ExecutionRequest, NamespaceScope, ScriptEngine, Submission, WorkerHandle, current_namespace,
};
pub use load::{CompileError, ExecutionUnit, LoadingNamespace, NamespaceId, UnitLoader, UnitName};
pub use outcome::{
    CANCELLED_MESSAGE, DiagnosticRenderer, ExecutionOutcome, StopSignal, TerminalCondition, classify,
};
pub use output::{BufferedSink, OutputChannel, OutputSink, StdioSink, Stream};
pub use session::{InMemoryRegistry, SessionBinding, SessionId, SessionRegistry, SharedState};

/// Re-exported substrate types that appear in the public API.
pub use rhai::{Dynamic, Map};
