//! Outcome classification.
//!
//! Whatever a run ends with is first converted into a [`TerminalCondition`]
//! and then classified into exactly one [`ExecutionOutcome`].

mod classify;
mod condition;
mod diagnostic;

use rhai::Dynamic;

pub use classify::classify;
pub use condition::{CallSite, Fault, FaultKind, StopSignal, TerminalCondition};
pub use diagnostic::{DiagnosticRenderer, TOP_LEVEL_FRAME};

/// Message reported for every cancelled run.
pub const CANCELLED_MESSAGE: &str = "Execution cancelled";

/// Result of one execution request.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The unit ran to completion and produced a value.
    Success(Dynamic),
    /// The run was stopped by a cancellation request.
    Cancelled,
    /// Compile, runtime or engine failure, as a sanitized diagnostic.
    Error(String),
}

impl ExecutionOutcome {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success(_) => "success",
            ExecutionOutcome::Cancelled => "cancelled",
            ExecutionOutcome::Error(_) => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionOutcome::Cancelled)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ExecutionOutcome::Error(_))
    }

    pub fn value(&self) -> Option<&Dynamic> {
        match self {
            ExecutionOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Dynamic> {
        match self {
            ExecutionOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Error(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionOutcome::Success(value) => write!(f, "{}", value),
            ExecutionOutcome::Cancelled => f.write_str(CANCELLED_MESSAGE),
            ExecutionOutcome::Error(diagnostic) => f.write_str(diagnostic),
        }
    }
}
