//! Typed output rasters

use super::engine::RegionBuffer;
use rastermath_core::{GeoTransform, PixelType, Raster, RasterElement, RasterSource, Result};

/// Output of one expression, stored in the pixel type chosen at compile time
#[derive(Debug, Clone)]
pub enum OutputRaster {
    U8(Raster<u8>),
    I8(Raster<i8>),
    U16(Raster<u16>),
    I16(Raster<i16>),
    U32(Raster<u32>),
    I32(Raster<i32>),
    F32(Raster<f32>),
    F64(Raster<f64>),
}

macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            OutputRaster::U8($r) => $body,
            OutputRaster::I8($r) => $body,
            OutputRaster::U16($r) => $body,
            OutputRaster::I16($r) => $body,
            OutputRaster::U32($r) => $body,
            OutputRaster::I32($r) => $body,
            OutputRaster::F32($r) => $body,
            OutputRaster::F64($r) => $body,
        }
    };
}

impl OutputRaster {
    /// Zero-filled raster of `pixel_type`
    pub fn new(
        pixel_type: PixelType,
        bands: usize,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
    ) -> Self {
        fn alloc<T: RasterElement>(b: usize, r: usize, c: usize, t: GeoTransform) -> Raster<T> {
            Raster::new(b, r, c).with_transform(t)
        }
        match pixel_type {
            PixelType::U8 => Self::U8(alloc(bands, rows, cols, transform)),
            PixelType::I8 => Self::I8(alloc(bands, rows, cols, transform)),
            PixelType::U16 => Self::U16(alloc(bands, rows, cols, transform)),
            PixelType::I16 => Self::I16(alloc(bands, rows, cols, transform)),
            PixelType::U32 => Self::U32(alloc(bands, rows, cols, transform)),
            PixelType::I32 => Self::I32(alloc(bands, rows, cols, transform)),
            PixelType::F32 => Self::F32(alloc(bands, rows, cols, transform)),
            PixelType::F64 => Self::F64(alloc(bands, rows, cols, transform)),
        }
    }

    pub fn pixel_type(&self) -> PixelType {
        dispatch!(self, r => pixel_type_of(r))
    }

    pub fn bands(&self) -> usize {
        dispatch!(self, r => r.bands())
    }

    /// Spatial dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        dispatch!(self, r => r.shape())
    }

    pub fn transform(&self) -> GeoTransform {
        dispatch!(self, r => *r.transform())
    }

    /// Read access independent of the stored type
    pub fn as_source(&self) -> &dyn RasterSource {
        dispatch!(self, r => r as &dyn RasterSource)
    }

    /// Sample of `band` (0-based) at (row, col) widened to f64, NaN outside
    pub fn get_f64(&self, band: usize, row: usize, col: usize) -> f64 {
        self.as_source().sample(band, row, col)
    }

    /// Copy converted to f64
    pub fn to_f64(&self) -> Raster<f64> {
        dispatch!(self, r => {
            let data = r.data().mapv(|v| v.to_f64_lossy());
            Raster::from_array(data).with_transform(*r.transform())
        })
    }

    pub fn as_f64(&self) -> Option<&Raster<f64>> {
        match self {
            OutputRaster::F64(r) => Some(r),
            _ => None,
        }
    }

    /// Write a buffer whose region starts at `origin` (row, col) of this raster.
    ///
    /// Values are already clamped; integer outputs take NaN as 0.
    pub(crate) fn write_region(&mut self, buffer: &RegionBuffer, origin: (usize, usize)) -> Result<()> {
        dispatch!(self, r => write_typed(r, buffer, origin))
    }
}

fn pixel_type_of<T: RasterElement>(_: &Raster<T>) -> PixelType {
    T::PIXEL_TYPE
}

fn write_typed<T: RasterElement>(
    raster: &mut Raster<T>,
    buffer: &RegionBuffer,
    (row0, col0): (usize, usize),
) -> Result<()> {
    let region = buffer.region;
    for band in 0..buffer.bands {
        for r in 0..region.rows {
            for c in 0..region.cols {
                let v = T::from_f64_saturating(buffer.get(band, r, c));
                raster.set(band, row0 + r, col0 + c, v)?;
            }
        }
    }
    Ok(())
}
