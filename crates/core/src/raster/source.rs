//! Read-only access to raster inputs

use super::{BandStatistics, GeoTransform, Raster, RasterElement, Window};
use crate::error::{Error, Result};

/// Read-only view of a multi-band raster, shared between worker threads.
///
/// Bands are 0-based here; user-facing names number them from 1.
pub trait RasterSource: Sync {
    /// Number of components per pixel
    fn band_count(&self) -> usize;

    /// Spatial dimensions as (rows, cols)
    fn shape(&self) -> (usize, usize);

    /// Pixel-to-physical transform
    fn transform(&self) -> GeoTransform;

    /// Sample of `band` at (row, col), NaN outside the raster
    fn sample(&self, band: usize, row: usize, col: usize) -> f64;

    /// Fill `out` with the components of pixel (row, col)
    fn read_pixel(&self, row: usize, col: usize, out: &mut [f64]) {
        for (band, v) in out.iter_mut().enumerate() {
            *v = self.sample(band, row, col);
        }
    }

    /// Read a window of `band` centered on (row, col).
    ///
    /// Samples are written row-major. Positions outside the raster read as
    /// NaN, like NaN samples inside it; the bounds are those of the whole
    /// raster, never of a caller's sub-region.
    fn read_window(&self, band: usize, row: usize, col: usize, window: Window, values: &mut [f64]) {
        let (rows, cols) = self.shape();
        for (i, (dr, dc)) in window.offsets().enumerate() {
            let r = row as isize + dr;
            let c = col as isize + dc;
            let inside = r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols;
            values[i] = if inside {
                self.sample(band, r as usize, c as usize)
            } else {
                f64::NAN
            };
        }
    }

    /// Statistics over a whole band
    fn band_statistics(&self, band: usize) -> Result<BandStatistics> {
        if band >= self.band_count() {
            return Err(Error::BandOutOfRange {
                band: band + 1,
                count: self.band_count(),
            });
        }
        let (rows, cols) = self.shape();
        Ok(BandStatistics::from_values(
            (0..rows).flat_map(|r| (0..cols).map(move |c| (r, c)))
                .map(|(r, c)| self.sample(band, r, c)),
        ))
    }
}

impl<T: RasterElement> RasterSource for Raster<T> {
    fn band_count(&self) -> usize {
        self.bands()
    }

    fn shape(&self) -> (usize, usize) {
        Raster::shape(self)
    }

    fn transform(&self) -> GeoTransform {
        *Raster::transform(self)
    }

    fn sample(&self, band: usize, row: usize, col: usize) -> f64 {
        self.data()
            .get((band, row, col))
            .map_or(f64::NAN, |v| v.to_f64_lossy())
    }

    fn band_statistics(&self, band: usize) -> Result<BandStatistics> {
        Raster::band_statistics(self, band)
    }
}
