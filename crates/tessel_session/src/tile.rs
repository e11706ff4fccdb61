//! # Tiles
//!
//! Row-major partition of the image plane into fixed-size tiles. Edge tiles
//! are clipped to the image.

use tessel_core::TileId;

/// One rectangular region of the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    /// Tile identity (row-major index).
    pub id: TileId,
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels (smaller than the tile size on the right edge).
    pub width: u32,
    /// Height in pixels (smaller than the tile size on the bottom edge).
    pub height: u32,
}

impl Tile {
    /// Pixels covered by the tile.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// Tiles covering a `width x height` image.
#[derive(Clone, Debug)]
pub struct TileGrid {
    tiles: Vec<Tile>,
    columns: u32,
    rows: u32,
}

impl TileGrid {
    /// Number of tiles covering the image, or `None` if tile IDs would not
    /// fit in a `u32`. Zero sizes give zero tiles.
    #[must_use]
    pub const fn tile_count(width: u32, height: u32, tile_size: u32) -> Option<u32> {
        if width == 0 || height == 0 || tile_size == 0 {
            return Some(0);
        }
        width.div_ceil(tile_size).checked_mul(height.div_ceil(tile_size))
    }

    /// Partitions the image. Zero sizes, or more tiles than a [`TileId`]
    /// can number, yield an empty grid.
    #[must_use]
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let count = match Self::tile_count(width, height, tile_size) {
            Some(count) if count > 0 => count,
            Some(_) => return Self::empty(),
            None => {
                tracing::warn!(width, height, tile_size, "tile count overflows tile IDs");
                return Self::empty();
            }
        };

        let columns = width.div_ceil(tile_size);
        let rows = height.div_ceil(tile_size);
        let mut tiles = Vec::with_capacity(count as usize);

        for row in 0..rows {
            for col in 0..columns {
                let x = col * tile_size;
                let y = row * tile_size;
                tiles.push(Tile {
                    id: TileId(row * columns + col),
                    x,
                    y,
                    width: tile_size.min(width - x),
                    height: tile_size.min(height - y),
                });
            }
        }

        Self {
            tiles,
            columns,
            rows,
        }
    }

    const fn empty() -> Self {
        Self {
            tiles: Vec::new(),
            columns: 0,
            rows: 0,
        }
    }

    /// All tiles, in ID order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Looks up a tile by ID.
    #[must_use]
    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.index())
    }

    /// Number of tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// True if the grid covers nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tiles per row.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Tile rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_fit() {
        let grid = TileGrid::new(64, 32, 16);
        assert_eq!(grid.len(), 8);
        assert_eq!((grid.columns(), grid.rows()), (4, 2));
        assert!(grid.tiles().iter().all(|t| t.pixel_count() == 256));
    }

    #[test]
    fn test_edge_tiles_clipped() {
        let grid = TileGrid::new(20, 10, 8);
        assert_eq!((grid.columns(), grid.rows()), (3, 2));
        let last = grid.get(TileId(5)).unwrap();
        assert_eq!((last.x, last.y, last.width, last.height), (16, 8, 4, 2));
        let total: usize = grid.tiles().iter().map(Tile::pixel_count).sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_empty_image() {
        assert!(TileGrid::new(0, 10, 8).is_empty());
        assert!(TileGrid::new(10, 10, 0).is_empty());
        assert_eq!(TileGrid::tile_count(0, 10, 8), Some(0));
    }

    #[test]
    fn test_tile_count_overflow_gives_empty_grid() {
        assert_eq!(TileGrid::tile_count(u32::MAX, u32::MAX, 1), None);
        assert_eq!(TileGrid::tile_count(u32::MAX, 1, 1), Some(u32::MAX));
        assert!(TileGrid::new(u32::MAX, u32::MAX, 1).is_empty());
        assert_eq!(TileGrid::tile_count(20, 10, 8), Some(6));
    }
}
