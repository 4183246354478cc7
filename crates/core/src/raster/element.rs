//! Raster element trait and the closed set of supported pixel types

use num_traits::{NumCast, Zero};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Scalar representation of a raster cell.
///
/// The set is closed: every output raster picks one of these once, when its
/// expression is compiled, and never changes it per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    #[default]
    F64,
}

impl PixelType {
    /// Lowest and highest values an output of this type can hold.
    ///
    /// For floating point types the lower bound is `-MAX`, not the smallest
    /// positive normal value.
    pub fn range(self) -> (f64, f64) {
        match self {
            PixelType::U8 => (u8::MIN as f64, u8::MAX as f64),
            PixelType::I8 => (i8::MIN as f64, i8::MAX as f64),
            PixelType::U16 => (u16::MIN as f64, u16::MAX as f64),
            PixelType::I16 => (i16::MIN as f64, i16::MAX as f64),
            PixelType::U32 => (u32::MIN as f64, u32::MAX as f64),
            PixelType::I32 => (i32::MIN as f64, i32::MAX as f64),
            PixelType::F32 => (f32::MIN as f64, f32::MAX as f64),
            PixelType::F64 => (f64::MIN, f64::MAX),
        }
    }

    /// Whether NaN can be stored without conversion
    pub fn is_float(self) -> bool {
        matches!(self, PixelType::F32 | PixelType::F64)
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelType::U8 => "u8",
            PixelType::I8 => "i8",
            PixelType::U16 => "u16",
            PixelType::I16 => "i16",
            PixelType::U32 => "u32",
            PixelType::I32 => "i32",
            PixelType::F32 => "f32",
            PixelType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Trait for types that can be stored in a raster cell.
///
/// This trait bounds the types that can be used as raster values,
/// ensuring they support necessary numeric operations.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Tag of this type in the closed [`PixelType`] set
    const PIXEL_TYPE: PixelType;

    /// Convert from f64, saturating at the type bounds.
    ///
    /// NaN becomes zero for integer types.
    fn from_f64_saturating(value: f64) -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Widen to f64, NaN when the value has no f64 form.
    ///
    /// Named apart from `ToPrimitive::to_f64`, which returns an `Option`.
    fn to_f64_lossy(self) -> f64 {
        <f64 as NumCast>::from(self).unwrap_or(f64::NAN)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $tag:ident) => {
        impl RasterElement for $t {
            const PIXEL_TYPE: PixelType = PixelType::$tag;

            fn from_f64_saturating(value: f64) -> Self {
                value as $t
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $tag:ident) => {
        impl RasterElement for $t {
            const PIXEL_TYPE: PixelType = PixelType::$tag;

            fn from_f64_saturating(value: f64) -> Self {
                value as $t
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }
        }
    };
}

impl_raster_element_int!(i8, I8);
impl_raster_element_int!(i16, I16);
impl_raster_element_int!(i32, I32);
impl_raster_element_int!(u8, U8);
impl_raster_element_int!(u16, U16);
impl_raster_element_int!(u32, U32);
impl_raster_element_float!(f32, F32);
impl_raster_element_float!(f64, F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert_eq!(PixelType::U8.range(), (0.0, 255.0));
        assert_eq!(PixelType::I16.range(), (-32768.0, 32767.0));
        let (lo, hi) = PixelType::F32.range();
        assert_eq!(lo, -(f32::MAX as f64));
        assert_eq!(hi, f32::MAX as f64);
        assert!(PixelType::F32.is_float() && PixelType::F64.is_float());
        assert!(!PixelType::I32.is_float());
    }

    #[test]
    fn test_saturating_conversion() {
        assert_eq!(u8::from_f64_saturating(300.0), 255);
        assert_eq!(u8::from_f64_saturating(-4.0), 0);
        assert_eq!(i16::from_f64_saturating(f64::NAN), 0);
        assert!(f32::from_f64_saturating(f64::NAN).is_nan());
        assert_eq!(<u16 as RasterElement>::PIXEL_TYPE, PixelType::U16);
    }

    fn widen<T: RasterElement>(v: T) -> f64 {
        v.to_f64_lossy()
    }

    #[test]
    fn test_widening_in_generic_context() {
        assert_eq!(widen(200u8), 200.0);
        assert_eq!(widen(-7i16), -7.0);
        assert_eq!(widen(u32::MAX), u32::MAX as f64);
        assert_eq!(widen(1.5f32), 1.5);
        assert!(widen(f64::NAN).is_nan());
    }
}
