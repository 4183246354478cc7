//! # rastermath core
//!
//! Core raster types shared by the rastermath crates.
//!
//! This crate provides:
//! - `Raster<T>`: generic multi-band raster grid
//! - `GeoTransform`: affine pixel-to-physical transformation
//! - `PixelType` / `RasterElement`: the closed set of cell representations
//! - `RasterSource`: read-only pixel, band and window access used by the engine
//! - `Algorithm`: trait for a consistent one-shot API

pub mod error;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{
    BandStatistics, GeoTransform, PixelType, Raster, RasterElement, RasterSource, Window,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, PixelType, Raster, RasterElement, RasterSource};
    pub use crate::Algorithm;
}

/// Core trait for algorithms with a one-shot entry point.
///
/// Algorithms transform an input according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
