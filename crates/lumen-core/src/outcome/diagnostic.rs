//! Sanitized diagnostic rendering.
//!
//! A diagnostic reads `<Kind>: <message>` followed by one `\tat` line per
//! frame, innermost first. Frames in the user's unit show the pseudo-filename
//! in place of the generated unit name, frames with no location are dropped,
//! and generated closure names are shown as `<closure>`.

use crate::load::{CompileError, SourceLocation, UnitName};

use super::condition::{StopSignal, TerminalCondition};

/// Label of the frame for the unit's top-level code.
pub const TOP_LEVEL_FRAME: &str = "<top-level>";

/// Prefix the substrate gives to generated closure functions.
const CLOSURE_PREFIX: &str = "anon$";

/// One rendered stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    function: String,
    source: Option<String>,
    location: SourceLocation,
}

/// Renders diagnostics for one unit.
#[derive(Debug, Clone)]
pub struct DiagnosticRenderer {
    pseudo_filename: String,
    unit: UnitName,
}

impl DiagnosticRenderer {
    pub fn new(pseudo_filename: impl Into<String>, unit: UnitName) -> Self {
        Self {
            pseudo_filename: pseudo_filename.into(),
            unit,
        }
    }

    pub fn pseudo_filename(&self) -> &str {
        &self.pseudo_filename
    }

    /// Render a failed run from its full condition chain.
    pub fn render(&self, condition: &TerminalCondition) -> String {
        let mut frames = Vec::new();
        let mut function = TOP_LEVEL_FRAME.to_string();
        let mut source: Option<String> = None;
        let mut current = condition;

        let (kind, message, location) = loop {
            match current {
                TerminalCondition::WrappedCause { call, inner } => {
                    if let Some(location) = call.location {
                        frames.push(Frame {
                            function: function.clone(),
                            source: source.clone(),
                            location,
                        });
                    }
                    function = call.function.clone();
                    source = call.source.clone();
                    current = inner;
                }
                TerminalCondition::OtherFault(fault) => {
                    break (fault.kind.label(), fault.message.clone(), fault.location);
                }
                TerminalCondition::Interrupted(signal) => {
                    let message = match signal {
                        StopSignal::Interrupt => "blocking call interrupted",
                        StopSignal::ForcedStop => "execution stopped",
                    };
                    break ("Interrupted", message.to_string(), None);
                }
                TerminalCondition::Normal(_) => {
                    break ("InternalError", "call wrapper without a fault".to_string(), None);
                }
            }
        };
        if let Some(location) = location {
            frames.push(Frame {
                function,
                source,
                location,
            });
        }

        let mut out = format!("{}: {}", kind, self.sanitize(&message));
        for frame in frames.iter().rev() {
            out.push_str("\n\tat ");
            out.push_str(&self.frame_line(frame));
        }
        out
    }

    /// Render a compile failure. The unit never ran, so the only frame is
    /// the top level of the submitted text.
    pub fn render_compile(&self, err: &CompileError) -> String {
        let mut out = format!("SyntaxError: {}", self.sanitize(&err.message));
        if let Some(location) = err.location {
            out.push_str(&format!(
                "\n\tat {} ({}:{})",
                TOP_LEVEL_FRAME, self.pseudo_filename, location
            ));
        }
        out
    }

    /// Render an engine fault.
    pub fn render_internal(&self, message: &str) -> String {
        format!("InternalError: {}", self.sanitize(message))
    }

    /// Rewrite source tags naming the unit (`'unit_7'`) to the pseudo-filename.
    ///
    /// Bare words are left alone; a script may well use the unit's name as an
    /// identifier of its own.
    pub fn sanitize(&self, text: &str) -> String {
        text.replace(
            &format!("'{}'", self.unit.as_str()),
            &format!("'{}'", self.pseudo_filename),
        )
    }

    fn frame_line(&self, frame: &Frame) -> String {
        let function = if frame.function.starts_with(CLOSURE_PREFIX) {
            "<closure>"
        } else {
            frame.function.as_str()
        };
        let file = match frame.source.as_deref() {
            None => self.pseudo_filename.as_str(),
            Some(source) if source == self.unit.as_str() => self.pseudo_filename.as_str(),
            Some(source) => source,
        };
        format!("{} ({}:{})", function, file, frame.location)
    }
}
