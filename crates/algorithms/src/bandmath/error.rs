//! Band math error taxonomy

use rastermath_expr::{EvalError, ParseError, Shape};
use thiserror::Error;

/// Errors raised while configuring, compiling or running band math.
///
/// Per-pixel evaluation failures are not errors: they are counted in
/// [`super::Diagnostics`] and never abort a pass.
#[derive(Error, Debug)]
pub enum BandMathError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Name '{name}' is already defined")]
    NameCollision { name: String },

    #[error("Unknown variable(s) {} in expression '{expression}'", .names.join(", "))]
    UnknownVariable {
        expression: String,
        names: Vec<String>,
    },

    #[error(
        "Band {band} referenced by '{name}' is out of range (input has {count} band(s)) in expression '{expression}'"
    )]
    BandOutOfRange {
        expression: String,
        name: String,
        band: usize,
        count: usize,
    },

    #[error(
        "Neighborhood '{name}' has size {width}x{height}; both sides must be odd and positive (expression '{expression}')"
    )]
    InvalidNeighborhoodSize {
        expression: String,
        name: String,
        width: usize,
        height: usize,
    },

    #[error("Syntax error in '{expression}' at position {position}: {message}")]
    Syntax {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("Shape mismatch in '{expression}': operator '{operation}' got {left} and {right}")]
    ShapeMismatch {
        expression: String,
        operation: String,
        left: Shape,
        right: Shape,
    },

    #[error("Dimensionality error in '{expression}' ({operation}): expected {expected}, found {found}")]
    Dimensionality {
        expression: String,
        operation: String,
        expected: String,
        found: String,
    },

    #[error("Band math pass cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] rastermath_core::Error),
}

impl BandMathError {
    /// Attach the expression text to a compile-time error raised without it
    pub(crate) fn in_expression(mut self, text: &str) -> Self {
        match &mut self {
            BandMathError::UnknownVariable { expression, .. }
            | BandMathError::BandOutOfRange { expression, .. }
            | BandMathError::InvalidNeighborhoodSize { expression, .. }
            | BandMathError::Syntax { expression, .. }
            | BandMathError::ShapeMismatch { expression, .. }
            | BandMathError::Dimensionality { expression, .. } => {
                *expression = text.to_string();
            }
            _ => {}
        }
        self
    }

    pub(crate) fn from_parse(text: &str, err: ParseError) -> Self {
        BandMathError::Syntax {
            expression: text.to_string(),
            position: err.position,
            message: err.message,
        }
    }

    /// Map a failure of the probe evaluation to the compile-time taxonomy
    pub(crate) fn from_probe(text: &str, err: EvalError) -> Self {
        let expression = text.to_string();
        match err {
            EvalError::ShapeMismatch {
                operation,
                left,
                right,
            } => BandMathError::ShapeMismatch {
                expression,
                operation: operation.to_string(),
                left,
                right,
            },
            EvalError::Dimensionality {
                operation,
                expected,
                found,
            } => BandMathError::Dimensionality {
                expression,
                operation: operation.to_string(),
                expected,
                found,
            },
            EvalError::IndexOutOfRange {
                operation,
                index,
                len,
            } => BandMathError::BandOutOfRange {
                expression,
                name: operation.to_string(),
                band: index.max(0.0) as usize,
                count: len,
            },
            EvalError::UnboundSlot(slot) => {
                BandMathError::Configuration(format!("variable slot {} is not bound", slot))
            }
        }
    }
}

/// Result type alias for band math
pub type Result<T> = std::result::Result<T, BandMathError>;
