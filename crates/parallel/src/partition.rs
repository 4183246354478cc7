//! Disjoint partitioning of a raster region into worker sub-regions

use rastermath_core::{Error, Result};

/// A rectangular block of pixels in full-raster coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// First row in the source raster
    pub row_offset: usize,
    /// First column in the source raster
    pub col_offset: usize,
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
}

impl Region {
    pub fn new(row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            rows,
            cols,
        }
    }

    /// Region covering a whole `rows x cols` raster
    pub fn full(rows: usize, cols: usize) -> Self {
        Self::new(0, 0, rows, cols)
    }

    /// Number of pixels
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail unless this region lies inside a `rows x cols` raster
    pub fn check_within(&self, rows: usize, cols: usize) -> Result<()> {
        if self.row_offset + self.rows > rows || self.col_offset + self.cols > cols {
            return Err(Error::IndexOutOfBounds {
                row: self.row_offset + self.rows,
                col: self.col_offset + self.cols,
                rows,
                cols,
            });
        }
        Ok(())
    }

    /// Convert region-local coordinates to source raster coordinates
    pub fn to_source_coords(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        (self.row_offset + local_row, self.col_offset + local_col)
    }

    /// Split into at most `parts` horizontal strips of near-equal height.
    ///
    /// Strips are returned top to bottom and cover the region exactly once.
    pub fn strips(&self, parts: usize) -> Vec<Region> {
        if self.is_empty() {
            return Vec::new();
        }
        let parts = parts.clamp(1, self.rows);
        let base = self.rows / parts;
        let extra = self.rows % parts;

        let mut out = Vec::with_capacity(parts);
        let mut row = self.row_offset;
        for i in 0..parts {
            let height = base + usize::from(i < extra);
            out.push(Region::new(row, self.col_offset, height, self.cols));
            row += height;
        }
        out
    }

    /// Split into square-ish tiles of at most `tile_size x tile_size`, row-major
    pub fn tiles(&self, tile_size: usize) -> Vec<Region> {
        TileIterator::new(*self, tile_size).collect()
    }
}

/// Iterator over disjoint tiles covering a region
pub struct TileIterator {
    region: Region,
    tile_size: usize,
    current_row: usize,
    current_col: usize,
}

impl TileIterator {
    pub fn new(region: Region, tile_size: usize) -> Self {
        Self {
            region,
            tile_size: tile_size.max(1),
            current_row: 0,
            current_col: 0,
        }
    }
}

impl Iterator for TileIterator {
    type Item = Region;

    fn next(&mut self) -> Option<Self::Item> {
        if self.region.is_empty() || self.current_row >= self.region.rows {
            return None;
        }

        let rows = self.tile_size.min(self.region.rows - self.current_row);
        let cols = self.tile_size.min(self.region.cols - self.current_col);
        let (row, col) = self
            .region
            .to_source_coords(self.current_row, self.current_col);
        let tile = Region::new(row, col, rows, cols);

        // Move to next tile
        self.current_col += self.tile_size;
        if self.current_col >= self.region.cols {
            self.current_col = 0;
            self.current_row += self.tile_size;
        }

        Some(tile)
    }
}
