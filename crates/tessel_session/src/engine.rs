//! # Accumulating Sampling Engine
//!
//! A deterministic stand-in for the pixel-sampling engine. Every tile owns
//! an accumulation buffer; rendering a tile sample adds one value per pixel,
//! drawn from a `ChaCha8` stream seeded by `(seed, tile, sample_id)`.
//!
//! The same tile sample always produces the same values, whichever thread
//! renders it and however the range was split, so a split or resumed render
//! accumulates exactly what an uninterrupted one does.
//!
//! Ranges must arrive in order: a range that does not start where the
//! tile's previous one ended is rejected, so nothing is rendered twice.

use crate::tile::TileGrid;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessel_core::{RenderFailure, SampleEngine, SampleId, TileId};

/// Accumulated state of one tile.
#[derive(Clone, Debug, Default)]
struct TileAccumulator {
    /// Per-pixel sum of sample values.
    sum: Vec<f32>,
    /// Exclusive end of everything rendered so far.
    rendered_through: SampleId,
}

/// Deterministic per-tile accumulating engine.
pub struct AccumulationEngine {
    seed: u64,
    tiles: Vec<Mutex<TileAccumulator>>,
    /// `(tile, sample_id)` pairs whose rendering fails.
    faults: Vec<(TileId, SampleId)>,
}

impl AccumulationEngine {
    /// Creates an engine with one empty buffer per tile of `grid`.
    #[must_use]
    pub fn new(grid: &TileGrid, seed: u64) -> Self {
        let tiles = grid
            .tiles()
            .iter()
            .map(|tile| {
                Mutex::new(TileAccumulator {
                    sum: vec![0.0; tile.pixel_count()],
                    rendered_through: 0,
                })
            })
            .collect();

        Self {
            seed,
            tiles,
            faults: Vec::new(),
        }
    }

    /// Makes any range of `tile` containing `sample_id` fail.
    #[must_use]
    pub fn with_fault(mut self, tile: TileId, sample_id: SampleId) -> Self {
        self.faults.push((tile, sample_id));
        self
    }

    /// Exclusive end of the samples rendered for `tile`.
    #[must_use]
    pub fn rendered_through(&self, tile: TileId) -> Option<SampleId> {
        self.tiles.get(tile.index()).map(|acc| acc.lock().rendered_through)
    }

    /// Per-pixel averages of `tile`, or `None` for an unknown tile.
    #[must_use]
    pub fn averaged(&self, tile: TileId) -> Option<Vec<f32>> {
        let acc = self.tiles.get(tile.index())?.lock();
        if acc.rendered_through == 0 {
            return Some(vec![0.0; acc.sum.len()]);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = acc.rendered_through as f32;
        Some(acc.sum.iter().map(|&s| s / n).collect())
    }

    fn sample_rng(&self, tile: TileId, sample_id: SampleId) -> ChaCha8Rng {
        let key = (u64::from(tile.raw()) << 32) | u64::from(sample_id);
        ChaCha8Rng::seed_from_u64(self.seed ^ key.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

impl SampleEngine for AccumulationEngine {
    fn render_range(&self, tile: TileId, start: SampleId, end: SampleId) -> Result<(), RenderFailure> {
        let Some(slot) = self.tiles.get(tile.index()) else {
            return Err(RenderFailure::new(format!("{tile} is not part of the image")));
        };

        if let Some(&(_, bad)) = self
            .faults
            .iter()
            .find(|&&(t, id)| t == tile && (start..end).contains(&id))
        {
            return Err(RenderFailure::new(format!("injected fault at sample {bad}")));
        }

        let mut acc = slot.lock();
        if acc.rendered_through != start {
            return Err(RenderFailure::new(format!(
                "{tile}: range [{start}, {end}) does not continue from sample {}",
                acc.rendered_through
            )));
        }

        for sample_id in start..end {
            let mut rng = self.sample_rng(tile, sample_id);
            for value in &mut acc.sum {
                *value += rng.gen::<f32>();
            }
        }
        acc.rendered_through = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AccumulationEngine {
        AccumulationEngine::new(&TileGrid::new(16, 8, 8), 7)
    }

    #[test]
    fn test_split_ranges_accumulate_identically() {
        let whole = engine();
        whole.render_range(TileId(1), 0, 40).unwrap();

        let split = engine();
        split.render_range(TileId(1), 0, 13).unwrap();
        split.render_range(TileId(1), 13, 40).unwrap();

        assert_eq!(whole.averaged(TileId(1)), split.averaged(TileId(1)));
        assert_eq!(split.rendered_through(TileId(1)), Some(40));
        assert_eq!(split.rendered_through(TileId(0)), Some(0));
    }

    #[test]
    fn test_out_of_order_range_rejected() {
        let e = engine();
        e.render_range(TileId(0), 0, 8).unwrap();
        assert!(e.render_range(TileId(0), 0, 8).is_err());
        assert!(e.render_range(TileId(0), 9, 12).is_err());
        assert!(e.render_range(TileId(0), 8, 12).is_ok());
    }

    #[test]
    fn test_fault_injection() {
        let e = engine().with_fault(TileId(0), 5);
        assert!(e.render_range(TileId(0), 0, 5).is_ok());
        assert!(e.render_range(TileId(0), 5, 6).is_err());
        assert!(e.render_range(TileId(1), 0, 10).is_ok());
        assert_eq!(e.rendered_through(TileId(0)), Some(5));
    }

    #[test]
    fn test_unknown_tile() {
        assert!(engine().render_range(TileId(99), 0, 1).is_err());
        assert_eq!(engine().averaged(TileId(99)), None);
    }
}
