//! # Identifiers
//!
//! Tile and tile-sample identifiers shared by every layer.

use std::fmt;

/// Index of one unit of progressive rendering work within a tile.
///
/// Tile sample IDs are monotonically increasing per tile. They are not pixel
/// sample counts: one tile sample ID covers one sample of every pixel in the tile.
pub type SampleId = u32;

/// Identity of a tile of the image plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(pub u32);

impl TileId {
    /// Creates a tile ID from its raw index.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the raw index as a `usize` for buffer addressing.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile#{}", self.0)
    }
}

impl From<u32> for TileId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
