//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// A georeferenced multi-band raster grid.
///
/// `Raster<T>` stores values of type `T` band-sequentially in an
/// `(bands, rows, cols)` array together with its geotransform.
///
/// # Example
///
/// ```ignore
/// use rastermath_core::Raster;
///
/// // 3-band 100x100 raster filled with zeros
/// let mut raster: Raster<f32> = Raster::new(3, 100, 100);
///
/// raster.set(1, 10, 20, 42.0)?;
/// let value = raster.get(1, 10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored as (band, row, col)
    data: Array3<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(bands: usize, rows: usize, cols: usize) -> Self {
        Self {
            data: Array3::zeros((bands, rows, cols)),
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Create a raster from band-sequential data
    pub fn from_vec(data: Vec<T>, bands: usize, rows: usize, cols: usize) -> Result<Self> {
        if bands == 0 || data.len() != bands * rows * cols {
            return Err(Error::InvalidDimensions {
                bands,
                width: cols,
                height: rows,
            });
        }

        let array = Array3::from_shape_vec((bands, rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Stack single-band grids of identical shape into one raster
    pub fn from_bands(bands: Vec<Array2<T>>) -> Result<Self> {
        let Some(first) = bands.first() else {
            return Err(Error::InvalidDimensions {
                bands: 0,
                width: 0,
                height: 0,
            });
        };
        let (rows, cols) = first.dim();

        let mut data = Array3::zeros((bands.len(), rows, cols));
        for (b, band) in bands.iter().enumerate() {
            if band.dim() != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar: band.nrows(),
                    ac: band.ncols(),
                });
            }
            data.index_axis_mut(Axis(0), b).assign(band);
        }

        Ok(Self::from_array(data))
    }

    /// Create a raster from an ndarray laid out as (band, row, col)
    pub fn from_array(data: Array3<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    // Dimensions

    /// Number of bands (components per pixel)
    pub fn bands(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Spatial dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Total number of samples over all bands
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get the sample of `band` (0-based) at (row, col)
    pub fn get(&self, band: usize, row: usize, col: usize) -> Result<T> {
        if band >= self.bands() {
            return Err(Error::BandOutOfRange {
                band: band + 1,
                count: self.bands(),
            });
        }
        self.data
            .get((band, row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set the sample of `band` (0-based) at (row, col)
    pub fn set(&mut self, band: usize, row: usize, col: usize, value: T) -> Result<()> {
        if band >= self.bands() {
            return Err(Error::BandOutOfRange {
                band: band + 1,
                count: self.bands(),
            });
        }
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(band, row, col)] = value;
        Ok(())
    }

    /// All components of the pixel at (row, col)
    pub fn pixel(&self, row: usize, col: usize) -> Result<Vec<T>> {
        (0..self.bands()).map(|b| self.get(b, row, col)).collect()
    }

    /// View of a single band (0-based)
    pub fn band(&self, band: usize) -> Result<ArrayView2<'_, T>> {
        if band >= self.bands() {
            return Err(Error::BandOutOfRange {
                band: band + 1,
                count: self.bands(),
            });
        }
        Ok(self.data.index_axis(Axis(0), band))
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Builder-style variant of [`Raster::set_transform`]
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    // Statistics

    /// Statistics of one band (0-based), skipping no-data and NaN samples
    pub fn band_statistics(&self, band: usize) -> Result<BandStatistics> {
        let view = self.band(band)?;
        Ok(BandStatistics::from_values(
            view.iter()
                .filter(|v| !v.is_nodata(self.nodata))
                .map(|v| v.to_f64_lossy()),
        ))
    }
}

/// Whole-band statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum: f64,
    /// Population variance
    pub variance: f64,
    pub valid_count: usize,
}

impl BandStatistics {
    /// Accumulate statistics over the non-NaN values of an iterator.
    ///
    /// With no valid value every statistic is NaN except `sum` (0).
    pub fn from_values(values: impl Iterator<Item = f64>) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut mean = 0.0;
        let mut m2 = 0.0;
        let mut count = 0usize;

        // Welford update keeps the variance stable for large offsets
        for v in values.filter(|v| !v.is_nan()) {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            count += 1;
            let delta = v - mean;
            mean += delta / count as f64;
            m2 += delta * (v - mean);
        }

        if count == 0 {
            return Self {
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
                sum: 0.0,
                variance: f64::NAN,
                valid_count: 0,
            };
        }

        Self {
            min,
            max,
            mean,
            sum,
            variance: m2 / count as f64,
            valid_count: count,
        }
    }
}
