//! Multi-band raster band math.
//!
//! Expressions are compiled against a [`VariableCatalog`] of inputs,
//! constants and matrices, then evaluated at every output position by a
//! pool of workers, each owning its own [`EvaluationContext`]. The result
//! shape of every expression is fixed at compile time, so outputs are
//! allocated before any pixel is read.
//!
//! ## Variables
//!
//! | Name | Value |
//! |---|---|
//! | `imN` | pixel of input N as a 1xB row vector |
//! | `imNbJ` | band J of input N (scalar) |
//! | `imNbJNWxH` | WxH window of band J around the position (odd sides) |
//! | `imNPhyX`, `imNPhyY` | physical coordinates of the pixel center |
//! | `imNbJMini`, `Maxi`, `Mean`, `Sum`, `Var` | statistics over the whole band |
//! | `idxX`, `idxY` | column and row of the position |
//!
//! An alias given at registration mirrors every `imN` name.

mod band_math_x;
pub mod catalog;
pub mod compiler;
mod context;
pub mod coordinator;
pub mod engine;
mod error;
pub mod neighborhood;
mod output;
mod params;

pub use band_math_x::{BandMath, BandMathInput, BandMathX, ExpressionHandle, ExpressionOutput};
pub use catalog::{GlobalStat, VariableCatalog, VariableDescriptor, VariableKind};
pub use compiler::{compile, CompiledExpression, OutputSpec};
pub use context::{Diagnostics, EvaluationContext};
pub use coordinator::{CoordinatorState, PassOutput, ThreadCoordinator};
pub use error::{BandMathError, Result};
pub use output::OutputRaster;
pub use params::BandMathParams;
