//! Terminal conditions of a run.

use rhai::{Dynamic, EvalAltResult};

use crate::execute::FORCED_STOP_TOKEN;
use crate::load::SourceLocation;

/// How a run stopped because of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// An interruptible blocking call was woken.
    Interrupt,
    /// The progress checkpoint observed the request between operations.
    ForcedStop,
}

/// A call through which a fault propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Name of the function that was called.
    pub function: String,
    /// Source the called function was defined in. `None` when the substrate
    /// recorded no source.
    pub source: Option<String>,
    /// Where the call was made, in the caller's source.
    pub location: Option<SourceLocation>,
}

/// Category of a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Raised by the running script. Carries the diagnostic kind label.
    Runtime(&'static str),
    /// Raised by the engine itself.
    Internal,
}

impl FaultKind {
    pub fn label(&self) -> &'static str {
        match self {
            FaultKind::Runtime(label) => label,
            FaultKind::Internal => "InternalError",
        }
    }
}

/// A failure that is neither a wrapper nor a cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    /// Message without location.
    pub message: String,
    /// Where the fault was raised, in the source of the innermost call.
    pub location: Option<SourceLocation>,
}

/// Everything a run can end with.
#[derive(Debug, Clone)]
pub enum TerminalCondition {
    /// The unit returned a value.
    Normal(Dynamic),
    /// A fault that propagated out of a call, tagged with the call site.
    WrappedCause {
        call: CallSite,
        inner: Box<TerminalCondition>,
    },
    /// The run was stopped by a cancellation request.
    Interrupted(StopSignal),
    /// Anything else.
    OtherFault(Fault),
}

impl TerminalCondition {
    /// Convert the substrate's evaluation result.
    pub fn from_result(result: Result<Dynamic, Box<EvalAltResult>>) -> Self {
        match result {
            Ok(value) => TerminalCondition::Normal(value),
            Err(err) => Self::from_eval(*err),
        }
    }

    /// Convert one substrate error, keeping every wrapper level.
    pub fn from_eval(err: EvalAltResult) -> Self {
        match err {
            EvalAltResult::ErrorInFunctionCall(function, source, inner, pos) => {
                // Nested script calls arrive flattened into one error whose name
                // reads `inner @ 'src' < middle < outer`. Only the outermost call
                // site survives; the inner levels get no location.
                let mut condition = Self::from_eval(*inner);
                let mut levels: Vec<&str> = function.split(" < ").collect();
                let outermost = levels.pop().unwrap_or_default();
                for level in levels {
                    let (function, source) = match level.split_once(" @ '") {
                        Some((function, source)) => {
                            (function, Some(source.trim_end_matches('\'').to_string()))
                        }
                        None => (level, None),
                    };
                    condition = TerminalCondition::WrappedCause {
                        call: CallSite {
                            function: function.to_string(),
                            source,
                            location: None,
                        },
                        inner: Box::new(condition),
                    };
                }
                TerminalCondition::WrappedCause {
                    call: CallSite {
                        function: outermost.to_string(),
                        source: (!source.is_empty()).then_some(source),
                        location: SourceLocation::from_position(pos),
                    },
                    inner: Box::new(condition),
                }
            }
            EvalAltResult::ErrorInModule(module, inner, pos) => TerminalCondition::WrappedCause {
                call: CallSite {
                    function: format!("import {}", module),
                    source: (!module.is_empty()).then_some(module),
                    location: SourceLocation::from_position(pos),
                },
                inner: Box::new(Self::from_eval(*inner)),
            },
            EvalAltResult::ErrorTerminated(token, _) => {
                TerminalCondition::Interrupted(stop_signal(&token))
            }
            EvalAltResult::Return(value, _) => TerminalCondition::Normal(value),
            other => TerminalCondition::OtherFault(runtime_fault(other)),
        }
    }

    /// An engine-side fault with no location.
    pub fn internal(message: impl Into<String>) -> Self {
        TerminalCondition::OtherFault(Fault {
            kind: FaultKind::Internal,
            message: message.into(),
            location: None,
        })
    }

    /// Number of wrapper levels around the innermost cause.
    pub fn depth(&self) -> usize {
        match self {
            TerminalCondition::WrappedCause { inner, .. } => 1 + inner.depth(),
            _ => 0,
        }
    }
}

/// The raw, unsanitized condition, for local logs only.
impl std::fmt::Display for TerminalCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalCondition::Normal(value) => write!(f, "{}", value),
            TerminalCondition::WrappedCause { call, inner } => {
                write!(f, "in call to {}", call.function)?;
                if let Some(source) = &call.source {
                    write!(f, " @ '{}'", source)?;
                }
                if let Some(location) = call.location {
                    write!(f, " ({})", location)?;
                }
                write!(f, ": {}", inner)
            }
            TerminalCondition::Interrupted(signal) => write!(f, "interrupted ({:?})", signal),
            TerminalCondition::OtherFault(fault) => {
                write!(f, "{}: {}", fault.kind.label(), fault.message)?;
                if let Some(location) = fault.location {
                    write!(f, " ({})", location)?;
                }
                Ok(())
            }
        }
    }
}

fn stop_signal(token: &Dynamic) -> StopSignal {
    let forced = token
        .read_lock::<rhai::ImmutableString>()
        .is_some_and(|s| s.as_str() == FORCED_STOP_TOKEN);
    if forced {
        StopSignal::ForcedStop
    } else {
        StopSignal::Interrupt
    }
}

fn runtime_fault(mut err: EvalAltResult) -> Fault {
    let location = SourceLocation::from_position(err.take_position());
    let kind = FaultKind::Runtime(kind_label(&err));
    let message = match err {
        EvalAltResult::ErrorArithmetic(message, _) => message,
        EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
        other => other.to_string(),
    };
    Fault {
        kind,
        message,
        location,
    }
}

fn kind_label(err: &EvalAltResult) -> &'static str {
    match err {
        EvalAltResult::ErrorArithmetic(..) => "ArithmeticError",
        EvalAltResult::ErrorParsing(..) => "SyntaxError",
        EvalAltResult::ErrorVariableNotFound(..)
        | EvalAltResult::ErrorFunctionNotFound(..)
        | EvalAltResult::ErrorModuleNotFound(..) => "NameError",
        EvalAltResult::ErrorPropertyNotFound(..) => "PropertyError",
        EvalAltResult::ErrorMismatchDataType(..)
        | EvalAltResult::ErrorMismatchOutputType(..)
        | EvalAltResult::ErrorIndexingType(..) => "TypeError",
        EvalAltResult::ErrorArrayBounds(..) | EvalAltResult::ErrorStringBounds(..) => {
            "IndexError"
        }
        EvalAltResult::ErrorStackOverflow(..)
        | EvalAltResult::ErrorTooManyOperations(..)
        | EvalAltResult::ErrorDataTooLarge(..) => "ResourceError",
        _ => "RuntimeError",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::Position;

    #[test]
    fn test_ok_is_normal() {
        let condition = TerminalCondition::from_result(Ok(Dynamic::from(2_i64)));
        assert!(matches!(condition, TerminalCondition::Normal(v) if v.as_int() == Ok(2)));
    }

    #[test]
    fn test_terminated_tokens() {
        let forced = TerminalCondition::from_eval(EvalAltResult::ErrorTerminated(
            FORCED_STOP_TOKEN.into(),
            Position::NONE,
        ));
        assert!(matches!(forced, TerminalCondition::Interrupted(StopSignal::ForcedStop)));

        let woken = TerminalCondition::from_eval(EvalAltResult::ErrorTerminated(
            "interrupt".into(),
            Position::NONE,
        ));
        assert!(matches!(woken, TerminalCondition::Interrupted(StopSignal::Interrupt)));
    }

    #[test]
    fn test_function_call_becomes_wrapper() {
        let err = EvalAltResult::ErrorInFunctionCall(
            "f".to_string(),
            "unit_1".to_string(),
            Box::new(EvalAltResult::ErrorArithmetic(
                "Division by zero: 1 / 0".to_string(),
                Position::new(1, 14),
            )),
            Position::new(2, 1),
        );

        match TerminalCondition::from_eval(err) {
            TerminalCondition::WrappedCause { call, inner } => {
                assert_eq!(call.function, "f");
                assert_eq!(call.source.as_deref(), Some("unit_1"));
                assert_eq!(call.location, Some(SourceLocation::new(2, 1)));
                match *inner {
                    TerminalCondition::OtherFault(fault) => {
                        assert_eq!(fault.kind.label(), "ArithmeticError");
                        assert_eq!(fault.message, "Division by zero: 1 / 0");
                        assert_eq!(fault.location, Some(SourceLocation::new(1, 14)));
                    }
                    other => panic!("unexpected inner {other:?}"),
                }
            }
            other => panic!("expected wrapper, got {other:?}"),
        }
    }

    #[test]
    fn test_flattened_call_chain_is_expanded() {
        let err = EvalAltResult::ErrorInFunctionCall(
            "inner @ 'unit_1' < outer".to_string(),
            "unit_1".to_string(),
            Box::new(EvalAltResult::ErrorRuntime("boom".into(), Position::new(2, 5))),
            Position::new(7, 1),
        );

        let condition = TerminalCondition::from_eval(err);
        assert_eq!(condition.depth(), 2);
        match condition {
            TerminalCondition::WrappedCause { call, inner } => {
                assert_eq!(call.function, "outer");
                assert_eq!(call.location, Some(SourceLocation::new(7, 1)));
                match *inner {
                    TerminalCondition::WrappedCause { call, .. } => {
                        assert_eq!(call.function, "inner");
                        assert_eq!(call.source.as_deref(), Some("unit_1"));
                        assert_eq!(call.location, None);
                    }
                    other => panic!("unexpected inner {other:?}"),
                }
            }
            other => panic!("expected wrapper, got {other:?}"),
        }
    }

    #[test]
    fn test_thrown_value_message_is_the_value() {
        let condition = TerminalCondition::from_eval(EvalAltResult::ErrorRuntime(
            "boom".into(),
            Position::new(1, 1),
        ));
        match condition {
            TerminalCondition::OtherFault(fault) => {
                assert_eq!(fault.kind.label(), "RuntimeError");
                assert_eq!(fault.message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_raw_display_keeps_unit_name() {
        let err = EvalAltResult::ErrorInFunctionCall(
            "f".to_string(),
            "unit_1".to_string(),
            Box::new(EvalAltResult::ErrorArithmetic("Division by zero".to_string(), Position::new(1, 14))),
            Position::new(2, 1),
        );
        assert_eq!(
            TerminalCondition::from_eval(err).to_string(),
            "in call to f @ 'unit_1' (2:1): ArithmeticError: Division by zero (1:14)"
        );
        assert_eq!(
            TerminalCondition::Interrupted(StopSignal::ForcedStop).to_string(),
            "interrupted (ForcedStop)"
        );
    }

    #[test]
    fn test_depth() {
        let inner = TerminalCondition::internal("x");
        assert_eq!(inner.depth(), 0);
        let wrapped = TerminalCondition::WrappedCause {
            call: CallSite {
                function: "g".into(),
                source: None,
                location: None,
            },
            inner: Box::new(inner),
        };
        assert_eq!(wrapped.depth(), 1);
    }
}
