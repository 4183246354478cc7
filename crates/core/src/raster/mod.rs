//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod neighborhood;
mod source;

pub use element::{PixelType, RasterElement};
pub use geotransform::GeoTransform;
pub use grid::{BandStatistics, Raster};
pub use neighborhood::Window;
pub use source::RasterSource;
