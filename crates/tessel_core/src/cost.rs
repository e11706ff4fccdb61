//! # Render Cost Estimation
//!
//! Time-based stint pacing, in three parts:
//!
//! ```text
//!   RayCostEstimator ── secs/sample ──┐
//!                                     ├──> StintPacer ──> next span end
//!   SnapshotEstimator ── interval ────┘
//! ```
//!
//! - [`RayCostEstimator`] averages the time per tile sample over a bounded
//!   history of rendered sub-spans. One lives with each tile across stints.
//! - [`SnapshotEstimator`] turns measured snapshot (checkpoint commit) costs
//!   into the interval between snapshots, either fixed or chosen so that
//!   snapshots stay below an overhead fraction of render time.
//! - [`StintPacer`] sizes a tile's next span so that it takes about one
//!   snapshot interval, growing by at most [`GROWTH_CAP`] per step.

use crate::ids::SampleId;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Minimum number of tile samples the history keeps before trimming old records.
pub const HISTORY_SAMPLE_FLOOR: u64 = 256;

/// Snapshot costs kept for the interval estimate.
pub const SNAPSHOT_HISTORY: usize = 10;

/// Snapshot interval used while no snapshot cost is known, in seconds.
pub const INITIAL_SNAPSHOT_INTERVAL_SECS: f64 = 30.0;

/// Largest factor by which an estimated interval or span length may grow
/// over the previous one.
pub const GROWTH_CAP: f64 = 2.5;

/// One rendered sub-span and how long it took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CostRecord {
    /// Wall time spent rendering.
    pub elapsed: Duration,
    /// First sample ID rendered.
    pub start: SampleId,
    /// Exclusive end.
    pub end: SampleId,
}

impl CostRecord {
    /// Tile samples covered by this record.
    #[must_use]
    pub const fn samples(&self) -> u64 {
        (self.end - self.start) as u64
    }
}

impl fmt::Display for CostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>12.3} ms  samples [{:>7}, {:>7})  n:{:>7}",
            self.elapsed.as_secs_f64() * 1000.0,
            self.start,
            self.end,
            self.samples()
        )
    }
}

/// Bounded history of sub-span render costs, newest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RayCostEstimator {
    history: VecDeque<CostRecord>,
}

impl RayCostEstimator {
    /// Creates an empty estimator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all history.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Records one rendered range and trims the oldest records.
    pub fn push(&mut self, elapsed: Duration, start: SampleId, end: SampleId) {
        self.history.push_front(CostRecord { elapsed, start, end });
        while self.should_drop_oldest() {
            self.history.pop_back();
        }
    }

    /// Average seconds per tile sample; zero without history.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        let samples = self.total_samples();
        if samples == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let samples = samples as f64;
        self.total_elapsed().as_secs_f64() / samples
    }

    /// Total tile samples in the history.
    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.history.iter().map(CostRecord::samples).sum()
    }

    /// Total wall time in the history.
    #[must_use]
    pub fn total_elapsed(&self) -> Duration {
        self.history.iter().map(|r| r.elapsed).sum()
    }

    /// Number of records kept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Records, newest first.
    pub fn records(&self) -> impl Iterator<Item = &CostRecord> {
        self.history.iter()
    }

    fn should_drop_oldest(&self) -> bool {
        // Always keep at least one record, whatever its size.
        if self.history.len() <= 1 {
            return false;
        }
        let total = self.total_samples();
        if total <= HISTORY_SAMPLE_FLOOR {
            return false;
        }
        let oldest = self.history.back().map_or(0, CostRecord::samples);
        total - oldest >= HISTORY_SAMPLE_FLOOR
    }
}

impl fmt::Display for RayCostEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RayCostEstimator {{")?;
        for record in &self.history {
            writeln!(f, "  {record}")?;
        }
        write!(
            f,
            "}} elapsed:{:.6} s samples:{} estimate:{:.3} ms/sample",
            self.total_elapsed().as_secs_f64(),
            self.total_samples(),
            self.estimate() * 1000.0
        )
    }
}

// =============================================================================
// Snapshot interval
// =============================================================================

/// Chooses the time between snapshots.
///
/// A positive fixed interval wins. Otherwise, with a positive overhead
/// fraction, the interval is `average snapshot cost / fraction`, so that a
/// fraction of `0.01` keeps snapshots below 1% of render time. With neither,
/// snapshots are disabled.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotEstimator {
    fixed_interval_secs: f64,
    overhead_fraction: f64,
    /// Last estimate, caps the next one.
    interval_secs: f64,
    /// Snapshot costs in seconds, newest first.
    history: VecDeque<f64>,
}

impl SnapshotEstimator {
    /// Creates an estimator. Negative values count as zero.
    ///
    /// # Arguments
    ///
    /// * `fixed_interval_secs` - Fixed snapshot interval, or 0 to estimate it
    /// * `overhead_fraction` - Target snapshot cost relative to the interval
    #[must_use]
    pub fn new(fixed_interval_secs: f64, overhead_fraction: f64) -> Self {
        Self {
            fixed_interval_secs: fixed_interval_secs.max(0.0),
            overhead_fraction: overhead_fraction.max(0.0),
            interval_secs: 0.0,
            history: VecDeque::with_capacity(SNAPSHOT_HISTORY),
        }
    }

    /// True if snapshots are taken at all.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.fixed_interval_secs > 0.0 || self.overhead_fraction > 0.0
    }

    /// Drops the cost history and the last estimate.
    pub fn reset(&mut self) {
        self.interval_secs = 0.0;
        self.history.clear();
    }

    /// Records the cost of one snapshot. Ignored with a fixed interval.
    pub fn push_snapshot_cost(&mut self, secs: f64) {
        if self.fixed_interval_secs > 0.0 {
            return;
        }
        self.history.push_front(secs.max(0.0));
        self.history.truncate(SNAPSHOT_HISTORY);
    }

    /// Average snapshot cost in seconds; zero without history.
    #[must_use]
    pub fn estimate_snapshot_secs(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.history.len() as f64;
        self.history.iter().sum::<f64>() / n
    }

    /// Estimates the next snapshot interval in seconds.
    ///
    /// Without a cost history the interval is
    /// [`INITIAL_SNAPSHOT_INTERVAL_SECS`]. An estimate never exceeds
    /// [`GROWTH_CAP`] times the previous one.
    pub fn estimate_interval(&mut self) -> f64 {
        if self.fixed_interval_secs > 0.0 {
            return self.fixed_interval_secs;
        }

        let snapshot_secs = self.estimate_snapshot_secs();
        self.interval_secs = if snapshot_secs <= 0.0 || self.overhead_fraction <= 0.0 {
            INITIAL_SNAPSHOT_INTERVAL_SECS
        } else {
            let wanted = snapshot_secs / self.overhead_fraction;
            if self.interval_secs > 0.0 {
                wanted.min(self.interval_secs * GROWTH_CAP)
            } else {
                wanted
            }
        };
        self.interval_secs
    }
}

impl fmt::Display for SnapshotEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SnapshotEstimator {{")?;
        for secs in &self.history {
            writeln!(f, "  {secs:.6} s")?;
        }
        write!(
            f,
            "}} total:{:.6} s estimate:{:.6} s",
            self.history.iter().sum::<f64>(),
            self.estimate_snapshot_secs()
        )
    }
}

// =============================================================================
// Stint pacing
// =============================================================================

/// Per-tile span sizing from a time budget.
///
/// Early estimates rest on little history, so a span may grow to at most
/// [`GROWTH_CAP`] times the largest span issued so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StintPacer {
    max_delta: u32,
}

impl StintPacer {
    /// Creates a pacer that has issued nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { max_delta: 0 }
    }

    /// Largest span length issued so far.
    #[must_use]
    pub const fn max_delta(&self) -> u32 {
        self.max_delta
    }

    /// End of a span starting at `start` that should render in about
    /// `interval_secs`, clipped to `limit`.
    ///
    /// Without a cost estimate the span is one sample long. The result is
    /// always greater than `start` when `limit > start`.
    pub fn end_sample_id(
        &mut self,
        cost: &RayCostEstimator,
        interval_secs: f64,
        start: SampleId,
        limit: SampleId,
    ) -> SampleId {
        let per_sample = cost.estimate();
        let mut delta = 1u32;
        if per_sample > 0.0 && interval_secs > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let cap = (f64::from(self.max_delta.max(1)) * GROWTH_CAP) as u32;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let wanted = (interval_secs / per_sample).min(f64::from(u32::MAX)) as u32;
            delta = wanted.clamp(1, cap.max(1));
            self.max_delta = self.max_delta.max(delta);
        }
        start.saturating_add(delta).min(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_estimate_is_zero() {
        let est = RayCostEstimator::new();
        assert!(est.is_empty());
        assert!(est.estimate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_cost() {
        let mut est = RayCostEstimator::new();
        est.push(Duration::from_millis(100), 0, 10);
        est.push(Duration::from_millis(300), 10, 30);
        // 0.4s over 30 samples
        assert!((est.estimate() - 0.4 / 30.0).abs() < 1e-9);
        assert_eq!(est.records().next().map(|r| r.start), Some(10));
    }

    #[test]
    fn test_history_trims_to_floor() {
        let mut est = RayCostEstimator::new();
        for i in 0..10u32 {
            est.push(Duration::from_millis(10), i * 100, (i + 1) * 100);
        }
        // Each record is 100 samples: three records keep 300 >= 256, two would not.
        assert_eq!(est.len(), 3);
        assert_eq!(est.total_samples(), 300);
    }

    #[test]
    fn test_single_large_record_kept() {
        let mut est = RayCostEstimator::new();
        est.push(Duration::from_millis(10), 0, 10_000);
        assert_eq!(est.len(), 1);
        est.push(Duration::from_millis(10), 10_000, 10_001);
        // Dropping the large record would leave 1 sample, below the floor.
        assert_eq!(est.len(), 2);
    }

    #[test]
    fn test_history_survives_across_pushes_of_small_spans() {
        let mut est = RayCostEstimator::new();
        for i in 0..40u32 {
            est.push(Duration::from_millis(1), i * 8, (i + 1) * 8);
        }
        // 8-sample records: 32 of them hold exactly the 256-sample floor.
        assert_eq!(est.total_samples(), 256);
        assert_eq!(est.len(), 32);
    }

    #[test]
    fn test_snapshot_estimator_modes() {
        let mut off = SnapshotEstimator::default();
        assert!(!off.is_active());

        let mut fixed = SnapshotEstimator::new(12.0, 0.5);
        fixed.push_snapshot_cost(100.0);
        assert!(fixed.is_active());
        assert!((fixed.estimate_interval() - 12.0).abs() < 1e-9);
        assert!(fixed.estimate_snapshot_secs().abs() < 1e-9);

        off.push_snapshot_cost(1.0);
        assert!((off.estimate_interval() - INITIAL_SNAPSHOT_INTERVAL_SECS).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_interval_from_overhead_with_growth_cap() {
        let mut est = SnapshotEstimator::new(0.0, 0.01);
        assert!((est.estimate_interval() - INITIAL_SNAPSHOT_INTERVAL_SECS).abs() < 1e-9);

        // 1 s snapshots at 1% overhead want 100 s, capped at 30 * 2.5.
        est.push_snapshot_cost(1.0);
        assert!((est.estimate_interval() - 75.0).abs() < 1e-9);
        assert!((est.estimate_interval() - 100.0).abs() < 1e-9);

        // Cheaper snapshots shrink the interval without a cap.
        for _ in 0..SNAPSHOT_HISTORY {
            est.push_snapshot_cost(0.1);
        }
        assert!((est.estimate_snapshot_secs() - 0.1).abs() < 1e-9);
        assert!((est.estimate_interval() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_pacer_without_cost_issues_single_samples() {
        let mut pacer = StintPacer::new();
        let est = RayCostEstimator::new();
        assert_eq!(pacer.end_sample_id(&est, 30.0, 10, 100), 11);
        assert_eq!(pacer.max_delta(), 0);
    }

    #[test]
    fn test_pacer_growth_is_capped() {
        let mut pacer = StintPacer::new();
        let mut est = RayCostEstimator::new();
        // 1 ms per sample; a 1 s interval wants 1000 samples.
        est.push(Duration::from_millis(10), 0, 10);

        assert_eq!(pacer.end_sample_id(&est, 1.0, 10, 10_000), 12);
        assert_eq!(pacer.end_sample_id(&est, 1.0, 12, 10_000), 17);
        assert_eq!(pacer.end_sample_id(&est, 1.0, 17, 10_000), 29);
        assert_eq!(pacer.max_delta(), 12);

        // Clipped to the limit.
        assert_eq!(pacer.end_sample_id(&est, 1.0, 29, 31), 31);
    }

    #[test]
    fn test_display_lists_records() {
        let mut est = RayCostEstimator::new();
        est.push(Duration::from_millis(20), 0, 10);
        let text = est.to_string();
        assert!(text.starts_with("RayCostEstimator {\n"));
        assert!(text.contains("samples [      0,      10)"));
        assert!(text.ends_with("samples:10 estimate:2.000 ms/sample"));
    }
}
