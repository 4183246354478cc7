//! # rastermath expr
//!
//! Embeddable parser and evaluator for band-math expressions over scalars
//! and matrices.
//!
//! Parsing produces an [`Expression`] that lists its free identifiers.
//! Binding maps each identifier to a slot index and yields a [`Program`],
//! which is evaluated against a slice of [`Value`]s without any name lookup.
//!
//! ```
//! use rastermath_expr::{Expression, Value};
//!
//! let expr = Expression::parse("(nir - red) / (nir + red)").unwrap();
//! let names = expr.identifiers().to_vec();
//! let program = expr
//!     .bind(|name| names.iter().position(|n| n == name).ok_or(()))
//!     .unwrap();
//!
//! let ndvi = program.evaluate(&[Value::Scalar(0.8), Value::Scalar(0.2)]).unwrap();
//! assert!((ndvi.values()[0] - 0.6).abs() < 1e-12);
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod functions;
mod lexer;
pub mod parser;
pub mod value;

pub use error::{EvalError, ParseError};
pub use eval::{Mode, Program};
pub use functions::{CONSTANTS, Function};
pub use lexer::WORD_OPERATORS;
pub use parser::{Expression, MAX_DEPTH};
pub use value::{Matrix, Shape, Value};

/// Names that cannot be used as variables: functions, constants and word operators
pub fn reserved_names() -> impl Iterator<Item = &'static str> {
    Function::names()
        .chain(CONSTANTS.iter().map(|(n, _)| *n))
        .chain(WORD_OPERATORS.iter().map(|(n, _)| *n))
}
