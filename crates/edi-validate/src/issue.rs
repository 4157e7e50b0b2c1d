//! Validation issue types.
//!
//! Each variant carries only the data needed to describe it; the severity is
//! fixed per variant.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Issue severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// The line is structurally wrong.
    Error,
    /// Should review; does not make the line invalid.
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Issue {
    // Line shape
    EmptyLine,
    WidthMismatch {
        expected: usize,
        actual: usize,
    },
    PrefixMismatch {
        expected: String,
        found: String,
    },

    // Field checks
    RequiredBlank {
        field: String,
    },
    OutOfBounds {
        field: String,
        start: usize,
        line_length: usize,
    },
    Truncated {
        field: String,
        declared: usize,
        available: usize,
    },
    DomainViolation {
        field: String,
        value: String,
    },
    FixedValueMismatch {
        field: String,
        expected: String,
        found: String,
    },

    // Record checks
    UnmatchedLine {
        index: usize,
    },
    MissingLine {
        line: String,
        min_occurs: u32,
        found: u32,
    },
    TooManyOccurrences {
        line: String,
        max_occurs: u32,
        found: u32,
    },
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self {
            Issue::Truncated { .. }
            | Issue::DomainViolation { .. }
            | Issue::FixedValueMismatch { .. } => Severity::Warning,
            Issue::EmptyLine
            | Issue::WidthMismatch { .. }
            | Issue::PrefixMismatch { .. }
            | Issue::RequiredBlank { .. }
            | Issue::OutOfBounds { .. }
            | Issue::UnmatchedLine { .. }
            | Issue::MissingLine { .. }
            | Issue::TooManyOccurrences { .. } => Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    /// Field the issue refers to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Issue::RequiredBlank { field }
            | Issue::OutOfBounds { field, .. }
            | Issue::Truncated { field, .. }
            | Issue::DomainViolation { field, .. }
            | Issue::FixedValueMismatch { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::EmptyLine => write!(f, "line is empty"),
            Issue::WidthMismatch { expected, actual } => {
                write!(f, "line length {actual} differs from layout width {expected}")
            }
            Issue::PrefixMismatch { expected, found } => {
                write!(f, "line prefix '{found}' does not match '{expected}'")
            }
            Issue::RequiredBlank { field } => write!(f, "required field '{field}' is blank"),
            Issue::OutOfBounds {
                field,
                start,
                line_length,
            } => write!(
                f,
                "field '{field}' starts at {start}, past the end of a {line_length}-char line"
            ),
            Issue::Truncated {
                field,
                declared,
                available,
            } => write!(
                f,
                "field '{field}' is truncated: {available} of {declared} chars present"
            ),
            Issue::DomainViolation { field, value } => {
                write!(f, "field '{field}' value '{value}' is outside its domain")
            }
            Issue::FixedValueMismatch {
                field,
                expected,
                found,
            } => write!(f, "field '{field}' should be '{expected}', found '{found}'"),
            Issue::UnmatchedLine { index } => {
                write!(f, "line {} matches no line definition", index + 1)
            }
            Issue::MissingLine {
                line,
                min_occurs,
                found,
            } => write!(
                f,
                "line '{line}' occurs {found} time(s), at least {min_occurs} required"
            ),
            Issue::TooManyOccurrences {
                line,
                max_occurs,
                found,
            } => write!(
                f,
                "line '{line}' occurs {found} time(s), at most {max_occurs} allowed"
            ),
        }
    }
}
