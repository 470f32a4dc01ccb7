//! Printing of execution outcomes.

use lumen_core::ExecutionOutcome;

use crate::colors;

/// Print `outcome` and report whether it was a success.
///
/// Values go to stdout; cancellations and diagnostics go to stderr.
pub fn print_outcome(outcome: &ExecutionOutcome) -> bool {
    match outcome {
        ExecutionOutcome::Success(value) => {
            if !value.is_unit() {
                println!("{}", value);
            }
            true
        }
        ExecutionOutcome::Cancelled => {
            eprintln!("{}{}{}", colors::YELLOW, outcome, colors::RESET);
            false
        }
        ExecutionOutcome::Error(diagnostic) => {
            eprintln!("{}{}{}", colors::RED, diagnostic, colors::RESET);
            false
        }
    }
}
