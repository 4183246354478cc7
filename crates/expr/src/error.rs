//! Error types for expression parsing and evaluation

use crate::value::Shape;
use thiserror::Error;

/// Syntax error found while lexing or parsing an expression
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at position {position}")]
pub struct ParseError {
    /// Character offset of the offending token
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Failure while evaluating a bound program
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Shape mismatch in '{operation}': {left} vs {right}")]
    ShapeMismatch {
        operation: &'static str,
        left: Shape,
        right: Shape,
    },

    #[error("Dimensionality error in '{operation}': expected {expected}, found {found}")]
    Dimensionality {
        operation: &'static str,
        expected: String,
        found: String,
    },

    #[error("Index {index} out of range 1..={len} in '{operation}'")]
    IndexOutOfRange {
        operation: &'static str,
        index: f64,
        len: usize,
    },

    #[error("Variable slot {0} is not bound")]
    UnboundSlot(usize),
}

impl EvalError {
    pub(crate) fn dimensionality(
        operation: &'static str,
        expected: impl Into<String>,
        found: impl ToString,
    ) -> Self {
        EvalError::Dimensionality {
            operation,
            expected: expected.into(),
            found: found.to_string(),
        }
    }
}

/// Result type alias for evaluation
pub type Result<T> = std::result::Result<T, EvalError>;
