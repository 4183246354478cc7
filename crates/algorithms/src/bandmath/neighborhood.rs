//! Per-worker cache of neighborhood windows.
//!
//! Each entry holds the samples of one (image, band, window) around the
//! position it was last read at, so asking again for the same position
//! costs nothing. Moving one column to the right along a row shifts the
//! window and reads only the new column; any other move re-reads the whole
//! window. Out-of-raster samples hold NaN, the same as NaN inside the raster.

use rastermath_core::{RasterSource, Window};
use std::collections::HashMap;

/// Identity of a neighborhood variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NeighborhoodKey {
    pub image: usize,
    pub band: usize,
    pub window: Window,
}

#[derive(Debug)]
struct Entry {
    /// (row, col) the samples were read around
    center: (usize, usize),
    values: Vec<f64>,
}

/// Window samples for the current position, exclusively owned by one worker
#[derive(Debug, Default)]
pub struct NeighborhoodCache {
    entries: HashMap<NeighborhoodKey, Entry>,
}

impl NeighborhoodCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples of `key` centered on (row, col), row-major
    pub fn get(&mut self, source: &dyn RasterSource, key: NeighborhoodKey, row: usize, col: usize) -> &[f64] {
        let len = key.window.len();
        let entry = self.entries.entry(key).or_insert_with(|| Entry {
            center: (usize::MAX, usize::MAX),
            values: vec![f64::NAN; len],
        });

        if entry.center != (row, col) {
            let (last_row, last_col) = entry.center;
            if last_row == row && last_col.checked_add(1) == Some(col) {
                slide_right(source, &key, row, col, entry);
            } else {
                source.read_window(key.band, row, col, key.window, &mut entry.values);
            }
            entry.center = (row, col);
        }

        &entry.values
    }
}

/// Shift every window row left by one and read the new right column
fn slide_right(source: &dyn RasterSource, key: &NeighborhoodKey, row: usize, col: usize, entry: &mut Entry) {
    let width = key.window.width();
    let hh = key.window.half_height() as isize;
    let new_col = col as isize + key.window.half_width() as isize;
    let (rows, cols) = source.shape();

    for (i, dr) in (-hh..=hh).enumerate() {
        let start = i * width;
        let end = start + width;
        entry.values.copy_within(start + 1..end, start);

        let r = row as isize + dr;
        let inside = r >= 0 && (r as usize) < rows && (new_col as usize) < cols;
        entry.values[end - 1] = if inside {
            source.sample(key.band, r as usize, new_col as usize)
        } else {
            f64::NAN
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rastermath_core::Raster;

    fn ramp(rows: usize, cols: usize) -> Raster<f64> {
        let data = (0..rows * cols).map(|i| i as f64).collect();
        Raster::from_vec(data, 1, rows, cols).unwrap()
    }

    fn same(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len()
            && a.iter().zip(b).all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
    }

    #[test]
    fn test_sliding_matches_full_read() {
        let r = ramp(6, 7);
        let key = NeighborhoodKey {
            image: 0,
            band: 0,
            window: Window::new(5, 3).unwrap(),
        };
        let mut cache = NeighborhoodCache::new();
        let mut values = vec![0.0; 15];

        for row in 0..6 {
            for col in 0..7 {
                let cached = cache.get(&r, key, row, col);
                r.read_window(0, row, col, key.window, &mut values);
                assert!(same(cached, &values), "window at ({}, {}) differs", row, col);
            }
        }
    }

    #[test]
    fn test_repeated_get_same_position() {
        let r = ramp(3, 3);
        let key = NeighborhoodKey {
            image: 0,
            band: 0,
            window: Window::new(3, 3).unwrap(),
        };
        let mut cache = NeighborhoodCache::new();
        let first = cache.get(&r, key, 1, 1).to_vec();
        let second = cache.get(&r, key, 1, 1).to_vec();
        assert_eq!(first, second);
        assert_eq!(first, (0..9).map(|v| v as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_nan_inside_reads_like_outside() {
        let mut r = ramp(3, 3);
        r.set(0, 1, 2, f64::NAN).unwrap();
        let key = NeighborhoodKey {
            image: 0,
            band: 0,
            window: Window::new(3, 3).unwrap(),
        };
        let mut cache = NeighborhoodCache::new();
        cache.get(&r, key, 1, 0);
        let slid = cache.get(&r, key, 1, 1).to_vec();
        assert!(slid[5].is_nan());
        let edge = cache.get(&r, key, 0, 2);
        assert!(edge[2].is_nan() && edge[5].is_nan());
        assert_eq!(edge[3], 1.0);
    }
}
