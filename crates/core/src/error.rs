//! Error types for rastermath core

use thiserror::Error;

/// Main error type for raster operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {bands} band(s) of {width}x{height}")]
    InvalidDimensions {
        bands: usize,
        width: usize,
        height: usize,
    },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Band {band} out of range (raster has {count} band(s), numbered from 1)")]
    BandOutOfRange { band: usize, count: usize },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for raster operations
pub type Result<T> = std::result::Result<T, Error>;
