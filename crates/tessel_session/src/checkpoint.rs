//! # Checkpoint Coordination
//!
//! **Turning per-tile events into session-wide checkpoints**
//!
//! The core fires the event callback once per tile per boundary and provides
//! no barrier between tiles. The [`CheckpointCoordinator`] is the callback
//! that counts those per-tile arrivals and commits a checkpoint exactly once,
//! when the last tile reaches the event ID.
//!
//! ```text
//!   tile 0 ──┐
//!   tile 1 ──┼──> on_event(id) ──> [arrivals: id -> n] ──(n == tiles)──> sink.commit(id)
//!   tile N ──┘
//! ```
//!
//! Each commit is timed. With a [`SnapshotEstimator`] attached, those timings
//! set the snapshot interval that the scheduler paces tile stints against.
//!
//! Also converts a requested number of checkpoint files into event IDs.
//! The persistence format is the sink's business, not this module's.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tessel_core::{CallbackFailure, EventAction, EventCallback, SampleId, SnapshotEstimator, TileId};

// =============================================================================
// Checkpoint planning
// =============================================================================

/// Number of checkpoint blocks of `steps` samples covering `total_steps`.
const fn block_count(total_steps: u32, steps: u32) -> u32 {
    total_steps.div_ceil(steps)
}

/// Samples between checkpoints so that `total_steps` yields a block count as
/// close as possible to `requested_files`.
///
/// Returns at least 1. `requested_files == 0` means one block covering everything.
#[must_use]
pub fn quality_steps(total_steps: u32, requested_files: u32) -> u32 {
    if requested_files == 0 {
        return total_steps.max(1);
    }
    if total_steps <= requested_files {
        return 1;
    }
    if total_steps % requested_files == 0 {
        return total_steps / requested_files;
    }

    let steps_a = total_steps / requested_files;
    let steps_b = steps_a + 1;
    let miss_a = block_count(total_steps, steps_a).abs_diff(requested_files);
    let miss_b = block_count(total_steps, steps_b).abs_diff(requested_files);
    if miss_a < miss_b {
        steps_a
    } else {
        steps_b
    }
}

/// Event IDs for `requested_files` evenly spaced checkpoints over `[0, total_samples)`.
///
/// Returns the ascending block ends `steps, 2*steps, ...`, skipping those
/// below `start`, always ending with `total_samples`.
#[must_use]
pub fn checkpoint_sample_ids(total_samples: SampleId, requested_files: u32, start: SampleId) -> Vec<SampleId> {
    if total_samples == 0 {
        return Vec::new();
    }

    let steps = quality_steps(total_samples, requested_files);
    let mut ids: Vec<SampleId> = (1..)
        .map(|k: u32| k.saturating_mul(steps))
        .take_while(|&id| id < total_samples)
        .filter(|&id| id >= start)
        .collect();
    ids.push(total_samples);

    tracing::debug!(
        total_samples,
        requested_files,
        steps,
        checkpoints = ids.len(),
        "checkpoint events planned"
    );
    ids
}

// =============================================================================
// Sinks
// =============================================================================

/// Receives each committed checkpoint.
pub trait CheckpointSink: Send + Sync {
    /// Persists (or announces) the checkpoint at `sample_id`.
    ///
    /// Runs on the worker thread of the last tile to reach the event.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackFailure`] if the checkpoint could not be written;
    /// the reporting tile's stint becomes fatal.
    fn commit(&self, sample_id: SampleId) -> Result<(), CallbackFailure>;
}

/// Sink that only logs commits.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl CheckpointSink for LogSink {
    fn commit(&self, sample_id: SampleId) -> Result<(), CallbackFailure> {
        tracing::info!(sample_id, "checkpoint committed");
        Ok(())
    }
}

/// Sink that records committed IDs in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    committed: Mutex<Vec<SampleId>>,
    fail_at: Option<SampleId>,
}

impl MemorySink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink whose commit fails at `sample_id`.
    #[must_use]
    pub fn failing_at(sample_id: SampleId) -> Self {
        Self {
            committed: Mutex::new(Vec::new()),
            fail_at: Some(sample_id),
        }
    }

    /// IDs committed so far, in commit order.
    #[must_use]
    pub fn committed(&self) -> Vec<SampleId> {
        self.committed.lock().clone()
    }
}

impl CheckpointSink for MemorySink {
    fn commit(&self, sample_id: SampleId) -> Result<(), CallbackFailure> {
        if self.fail_at == Some(sample_id) {
            return Err(CallbackFailure::new(format!(
                "checkpoint write at sample {sample_id} failed"
            )));
        }
        self.committed.lock().push(sample_id);
        Ok(())
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Event callback that counts per-tile arrivals and commits checkpoints.
pub struct CheckpointCoordinator {
    /// Tiles that must reach an event before it is committed.
    tile_count: usize,
    /// Event ID at which tiles are told to stop.
    stop_at: Option<SampleId>,
    sink: Arc<dyn CheckpointSink>,
    arrivals: Mutex<BTreeMap<SampleId, usize>>,
    /// IDs the sink accepted, in commit order.
    committed: Mutex<Vec<SampleId>>,
    snapshots: Mutex<SnapshotClock>,
}

/// Snapshot estimator and its latest interval.
#[derive(Debug, Default)]
struct SnapshotClock {
    estimator: SnapshotEstimator,
    interval_secs: f64,
}

impl CheckpointCoordinator {
    /// Creates a coordinator for `tile_count` tiles.
    ///
    /// # Arguments
    ///
    /// * `tile_count` - Tiles rendered by the session
    /// * `sink` - Receives committed checkpoints
    /// * `stop_at` - Event ID at which every tile aborts its stint
    #[must_use]
    pub fn new(tile_count: usize, sink: Arc<dyn CheckpointSink>, stop_at: Option<SampleId>) -> Self {
        Self {
            tile_count,
            stop_at,
            sink,
            arrivals: Mutex::new(BTreeMap::new()),
            committed: Mutex::new(Vec::new()),
            snapshots: Mutex::new(SnapshotClock::default()),
        }
    }

    /// Attaches a snapshot estimator fed with measured commit times.
    #[must_use]
    pub fn with_snapshot_estimator(self, mut estimator: SnapshotEstimator) -> Self {
        let interval_secs = estimator.estimate_interval();
        *self.snapshots.lock() = SnapshotClock {
            estimator,
            interval_secs,
        };
        self
    }

    /// Current snapshot interval in seconds, or `None` when no active
    /// snapshot estimator is attached.
    #[must_use]
    pub fn snapshot_interval_secs(&self) -> Option<f64> {
        let clock = self.snapshots.lock();
        clock.estimator.is_active().then_some(clock.interval_secs)
    }

    /// Tiles that have reached `sample_id` so far.
    #[must_use]
    pub fn arrivals(&self, sample_id: SampleId) -> usize {
        self.arrivals.lock().get(&sample_id).copied().unwrap_or(0)
    }

    /// Event IDs the sink has accepted, in commit order.
    ///
    /// An ID every tile reached whose commit failed is not listed.
    #[must_use]
    pub fn committed(&self) -> Vec<SampleId> {
        self.committed.lock().clone()
    }

    /// Configured stop event.
    #[must_use]
    pub const fn stop_at(&self) -> Option<SampleId> {
        self.stop_at
    }
}

impl fmt::Debug for CheckpointCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointCoordinator")
            .field("tile_count", &self.tile_count)
            .field("stop_at", &self.stop_at)
            .field("committed", &self.committed())
            .field("snapshot_interval_secs", &self.snapshot_interval_secs())
            .finish_non_exhaustive()
    }
}

impl EventCallback for CheckpointCoordinator {
    fn on_event(&self, tile: TileId, sample_id: SampleId) -> Result<EventAction, CallbackFailure> {
        let last_arrival = {
            let mut arrivals = self.arrivals.lock();
            let count = arrivals.entry(sample_id).or_insert(0);
            *count += 1;
            *count == self.tile_count
        };

        tracing::trace!(tile = %tile, sample_id, last_arrival, "tile reached event");

        // The lock is released before the sink runs; it may do slow IO.
        if last_arrival {
            let started = Instant::now();
            self.sink.commit(sample_id)?;
            let snapshot_secs = started.elapsed().as_secs_f64();
            self.committed.lock().push(sample_id);

            let interval_secs = {
                let mut clock = self.snapshots.lock();
                clock.estimator.push_snapshot_cost(snapshot_secs);
                clock.interval_secs = clock.estimator.estimate_interval();
                clock.interval_secs
            };
            tracing::info!(
                sample_id,
                tiles = self.tile_count,
                snapshot_secs,
                interval_secs,
                "all tiles reached event"
            );
        }

        Ok(EventAction::from_continue(self.stop_at != Some(sample_id)))
    }
}
