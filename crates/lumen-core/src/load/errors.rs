//! Compile-stage errors.

use rhai::{ParseError, Position};
use thiserror::Error;

/// A location in the submitted source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Convert a substrate position. `None` for positions that carry no location.
    pub fn from_position(pos: Position) -> Option<Self> {
        if pos.is_none() {
            return None;
        }
        let line = pos.line()?;
        Some(Self::new(line, pos.position().unwrap_or(1)))
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source text that could not be compiled into a unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct CompileError {
    /// Diagnostic from the parser, without location.
    pub message: String,

    /// Where the parser gave up, if known.
    pub location: Option<SourceLocation>,
}

impl CompileError {
    pub fn new(message: impl Into<String>, location: Option<(usize, usize)>) -> Self {
        Self {
            message: message.into(),
            location: location.map(|(line, column)| SourceLocation::new(line, column)),
        }
    }

    pub(crate) fn from_parse(err: ParseError) -> Self {
        let ParseError(kind, pos) = err;
        Self {
            message: kind.to_string(),
            location: SourceLocation::from_position(pos),
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{} (line {}, column {})", self.message, loc.line, loc.column),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_location() {
        let err = CompileError::new("Expecting ';'", Some((2, 7)));
        assert_eq!(err.to_string(), "Expecting ';' (line 2, column 7)");
    }

    #[test]
    fn test_display_without_location() {
        let err = CompileError::new("script is empty", None);
        assert_eq!(err.to_string(), "script is empty");
    }

    #[test]
    fn test_none_position_has_no_location() {
        assert!(SourceLocation::from_position(Position::NONE).is_none());
        let loc = SourceLocation::from_position(Position::new(3, 4)).unwrap();
        assert_eq!(loc, SourceLocation::new(3, 4));
    }
}
