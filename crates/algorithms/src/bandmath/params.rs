//! Pass configuration

use rastermath_core::PixelType;
use rastermath_parallel::ProcessingMode;
use serde::{Deserialize, Serialize};

/// Parameters for a band-math pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandMathParams {
    /// Pixel type of outputs compiled without an explicit type
    pub output_type: PixelType,
    /// Worker count selection
    pub mode: ProcessingMode,
    /// Split the region into square tiles of this side instead of one
    /// row strip per worker
    pub tile_size: Option<usize>,
}

impl Default for BandMathParams {
    fn default() -> Self {
        Self {
            output_type: PixelType::F64,
            mode: ProcessingMode::Parallel,
            tile_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let p = BandMathParams::default();
        assert_eq!(p.output_type, PixelType::F64);
        assert_eq!(p.mode, ProcessingMode::Parallel);
        assert_eq!(p.tile_size, None);
    }

    #[test]
    fn test_params_serde() {
        let p = BandMathParams {
            output_type: PixelType::U16,
            mode: ProcessingMode::ParallelWith(4),
            tile_size: Some(64),
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: BandMathParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);

        let partial: BandMathParams = serde_json::from_str(r#"{"output_type":"u8"}"#).unwrap();
        assert_eq!(partial.output_type, PixelType::U8);
        assert_eq!(partial.mode, ProcessingMode::Parallel);
    }
}
