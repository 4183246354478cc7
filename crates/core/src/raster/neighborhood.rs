//! Rectangular windows centered on a cell

use crate::error::{Error, Result};

/// A `width x height` window centered on the current cell.
///
/// Both sides are odd so the window has a well defined center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    width: usize,
    height: usize,
}

impl Window {
    /// Create a window; `width` and `height` must be odd and positive
    pub fn new(width: usize, height: usize) -> Result<Self> {
        for (name, size) in [("width", width), ("height", height)] {
            if size == 0 || size % 2 == 0 {
                return Err(Error::InvalidParameter {
                    name,
                    value: size.to_string(),
                    reason: "window sides must be odd and positive".into(),
                });
            }
        }
        Ok(Self { width, height })
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.height
    }

    /// Columns on each side of the center
    pub fn half_width(&self) -> usize {
        self.width / 2
    }

    /// Rows on each side of the center
    pub fn half_height(&self) -> usize {
        self.height / 2
    }

    /// Number of samples in the window
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Always false
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Relative (row, col) offsets in row-major order
    pub fn offsets(&self) -> impl Iterator<Item = (isize, isize)> + '_ {
        let hh = self.half_height() as isize;
        let hw = self.half_width() as isize;
        (-hh..=hh).flat_map(move |dr| (-hw..=hw).map(move |dc| (dr, dc)))
    }
}
