//! # rastermath algorithms
//!
//! Band math over multi-band rasters: per-pixel expressions mixing pixel
//! vectors, band scalars, neighborhoods, declared constants and matrices.
//!
//! ```ignore
//! use rastermath_algorithms::prelude::*;
//!
//! let mut bm = BandMathX::new(BandMathParams::default());
//! bm.register_input(&red_nir, None)?;
//! bm.compile("ndvi(im1b1, im1b2)")?;
//! let outputs = bm.run()?;
//! ```

pub mod bandmath;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bandmath::{
        BandMath, BandMathError, BandMathInput, BandMathParams, BandMathX, Diagnostics,
        ExpressionHandle, ExpressionOutput, OutputRaster,
    };
    pub use rastermath_core::prelude::*;
    pub use rastermath_parallel::{CancelToken, ProcessingMode, Region};
}
