use super::condition::TerminalCondition;
use super::diagnostic::DiagnosticRenderer;
use super::ExecutionOutcome;

/// Classify how a run ended.
///
/// Exactly one wrapper level is unwrapped before the cause is examined. A
/// cancellation directly under that wrapper is still a cancellation; anything
/// deeper is an error rendered from the full chain.
pub fn classify(condition: TerminalCondition, renderer: &DiagnosticRenderer) -> ExecutionOutcome {
    match condition {
        TerminalCondition::Normal(value) => ExecutionOutcome::Success(value),
        TerminalCondition::Interrupted(_) => ExecutionOutcome::Cancelled,
        TerminalCondition::WrappedCause { call, inner } => match *inner {
            TerminalCondition::Normal(value) => ExecutionOutcome::Success(value),
            TerminalCondition::Interrupted(_) => ExecutionOutcome::Cancelled,
            inner => ExecutionOutcome::Error(renderer.render(&TerminalCondition::WrappedCause {
                call,
                inner: Box::new(inner),
            })),
        },
        fault @ TerminalCondition::OtherFault(_) => {
            ExecutionOutcome::Error(renderer.render(&fault))
        }
    }
}
