//! # Tile Scheduler
//!
//! Plans stints and drives every tile from its cursor to `total_samples`.
//!
//! Each tile has at most one stint in flight, so the sub-spans of a tile are
//! always rendered in order while different tiles overlap freely on the
//! worker pool. The next span of a tile is planned as
//! `[cursor, min(cursor + stint_samples, total_samples))`.
//!
//! With pacing, the span is shortened so that it renders in about one
//! snapshot interval, judged from the tile's own cost history.
//!
//! ```text
//!   Pending ──submit──> Running ──Completed, more left──> Running
//!                          │──Completed, done──────────> Finished
//!                          │──AbortedByCallback(total)─> Finished
//!                          │──AbortedByCallback(id)────> Paused { at: id }
//!                          └──Fatal(err)───────────────> Failed(err)
//! ```

use crate::checkpoint::CheckpointCoordinator;
use crate::error::{SessionError, SessionResult};
use crate::pool::{StintReport, StintStatus, StintTask, WorkerPool};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tessel_core::{PlannedSpan, RayCostEstimator, SampleId, StintError, StintPacer, TileId};

// =============================================================================
// Progress
// =============================================================================

/// Where a tile stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TileState {
    /// Not yet submitted.
    Pending,
    /// A stint is in flight.
    Running,
    /// Every sample ID is rendered.
    Finished,
    /// A callback stopped the tile after the event at `at`.
    Paused {
        /// Event ID at which the tile stopped.
        at: SampleId,
    },
    /// A stint failed; the tile is not retried.
    Failed(StintError),
}

/// Progress of one tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileProgress {
    /// The tile.
    pub tile: TileId,
    /// Exclusive end of the rendered samples.
    pub rendered_through: SampleId,
    /// Current state.
    pub state: TileState,
    /// Stints executed for the tile in this run.
    pub stints: u32,
    /// Render cost history over the tile's stints.
    pub cost: RayCostEstimator,
    /// Span sizing state when paced.
    pub pacer: StintPacer,
}

impl TileProgress {
    fn starting_at(tile: TileId, cursor: SampleId) -> Self {
        Self {
            tile,
            rendered_through: cursor,
            state: TileState::Pending,
            stints: 0,
            cost: RayCostEstimator::new(),
            pacer: StintPacer::new(),
        }
    }
}

/// Outcome of a run or resume.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Per-tile progress, in tile ID order.
    pub tiles: Vec<TileProgress>,
}

impl SessionSummary {
    /// Tiles that rendered every sample ID.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.count(|s| matches!(s, TileState::Finished))
    }

    /// Tiles stopped by a callback.
    #[must_use]
    pub fn paused(&self) -> usize {
        self.count(|s| matches!(s, TileState::Paused { .. }))
    }

    /// Tiles with a fatal stint.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TileState::Failed(_)))
    }

    /// True if every tile finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.finished() == self.tiles.len()
    }

    /// Progress of `tile`.
    #[must_use]
    pub fn get(&self, tile: TileId) -> Option<&TileProgress> {
        self.tiles.iter().find(|p| p.tile == tile)
    }

    fn count(&self, pred: impl Fn(&TileState) -> bool) -> usize {
        self.tiles.iter().filter(|p| pred(&p.state)).count()
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tiles:{} finished:{} paused:{} failed:{}",
            self.tiles.len(),
            self.finished(),
            self.paused(),
            self.failed()
        )
    }
}

/// Per-tile cursors to continue an interrupted session from.
///
/// Failed tiles are left out; their buffers hold a partial sub-span.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResumeState {
    cursors: BTreeMap<TileId, SampleId>,
}

impl ResumeState {
    /// Builds a resume state from explicit cursors.
    #[must_use]
    pub fn new(cursors: impl IntoIterator<Item = (TileId, SampleId)>) -> Self {
        Self {
            cursors: cursors.into_iter().collect(),
        }
    }

    /// Builds a resume state from the summary of a stopped run.
    #[must_use]
    pub fn from_summary(summary: &SessionSummary) -> Self {
        Self::new(
            summary
                .tiles
                .iter()
                .filter(|p| !matches!(p.state, TileState::Failed(_)))
                .map(|p| (p.tile, p.rendered_through)),
        )
    }

    /// Cursor of `tile`.
    #[must_use]
    pub fn cursor(&self, tile: TileId) -> Option<SampleId> {
        self.cursors.get(&tile).copied()
    }

    /// Tiles with a cursor, ascending.
    pub fn tiles(&self) -> impl Iterator<Item = TileId> + '_ {
        self.cursors.keys().copied()
    }

    /// Tiles to resume.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// True if nothing can be resumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Issues stints to a [`WorkerPool`] until every tile stops.
#[derive(Clone, Debug)]
pub struct TileScheduler {
    total_samples: SampleId,
    stint_samples: SampleId,
    /// Source of the snapshot interval spans are paced against.
    pacing: Option<Arc<CheckpointCoordinator>>,
}

impl TileScheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if either length is zero.
    pub fn new(total_samples: SampleId, stint_samples: SampleId) -> SessionResult<Self> {
        if total_samples == 0 || stint_samples == 0 {
            return Err(SessionError::InvalidConfig(
                "total_samples and stint_samples must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            total_samples,
            stint_samples,
            pacing: None,
        })
    }

    /// Paces spans against the coordinator's snapshot interval.
    ///
    /// `stint_samples` stays the upper bound of a span. Without an active
    /// snapshot estimator on the coordinator, spans are not paced.
    #[must_use]
    pub fn with_pacing(mut self, coordinator: Arc<CheckpointCoordinator>) -> Self {
        self.pacing = Some(coordinator);
        self
    }

    /// Next span for a tile at `cursor`, or `None` once it is done.
    #[must_use]
    pub fn next_span(&self, cursor: SampleId) -> Option<PlannedSpan> {
        if cursor >= self.total_samples {
            return None;
        }
        let end = cursor.saturating_add(self.stint_samples).min(self.total_samples);
        PlannedSpan::new(cursor, end).ok()
    }

    /// Renders `tiles` from sample 0.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerPool`] if the pool stops answering.
    /// Stint failures do not fail the run; they are reported per tile.
    pub fn run(&self, pool: &WorkerPool, tiles: &[TileId]) -> SessionResult<SessionSummary> {
        let progress = tiles.iter().map(|&t| TileProgress::starting_at(t, 0)).collect();
        self.drive(pool, progress)
    }

    /// Continues the tiles in `state` from their cursors.
    ///
    /// # Errors
    ///
    /// Same as [`TileScheduler::run`].
    pub fn resume(&self, pool: &WorkerPool, state: &ResumeState) -> SessionResult<SessionSummary> {
        let progress = state
            .cursors
            .iter()
            .map(|(&t, &cursor)| TileProgress::starting_at(t, cursor))
            .collect();
        self.drive(pool, progress)
    }

    fn drive(&self, pool: &WorkerPool, mut progress: Vec<TileProgress>) -> SessionResult<SessionSummary> {
        progress.sort_by_key(|p| p.tile);
        let index: BTreeMap<TileId, usize> = progress.iter().enumerate().map(|(i, p)| (p.tile, i)).collect();

        let mut in_flight = 0usize;
        for p in &mut progress {
            if self.advance(pool, p)? {
                in_flight += 1;
            }
        }
        tracing::debug!(tiles = progress.len(), in_flight, "scheduling started");

        while in_flight > 0 {
            let report = pool.recv()?;
            in_flight -= 1;

            let Some(&i) = index.get(&report.tile) else {
                tracing::warn!(tile = %report.tile, "report for unscheduled tile");
                continue;
            };
            if self.apply(pool, &mut progress[i], report)? {
                in_flight += 1;
            }
        }

        let summary = SessionSummary { tiles: progress };
        tracing::info!(%summary, "scheduling finished");
        Ok(summary)
    }

    /// Submits the next stint of `p`, or marks it finished. Returns true if
    /// a stint was submitted.
    fn advance(&self, pool: &WorkerPool, p: &mut TileProgress) -> SessionResult<bool> {
        match self.paced_span(p) {
            Some(span) => {
                pool.submit(StintTask {
                    tile: p.tile,
                    span,
                    cost: std::mem::take(&mut p.cost),
                })?;
                p.state = TileState::Running;
                p.stints += 1;
                Ok(true)
            }
            None => {
                p.state = TileState::Finished;
                Ok(false)
            }
        }
    }

    /// Next span of `p`, shortened to the snapshot interval when paced.
    fn paced_span(&self, p: &mut TileProgress) -> Option<PlannedSpan> {
        let span = self.next_span(p.rendered_through)?;
        let Some(interval_secs) = self.pacing.as_ref().and_then(|c| c.snapshot_interval_secs()) else {
            return Some(span);
        };
        let end = p.pacer.end_sample_id(&p.cost, interval_secs, span.start(), span.end());
        PlannedSpan::new(span.start(), end).ok()
    }

    fn apply(&self, pool: &WorkerPool, p: &mut TileProgress, report: StintReport) -> SessionResult<bool> {
        p.cost = report.cost;
        match report.status {
            StintStatus::Completed => {
                p.rendered_through = report.span.end();
                tracing::trace!(
                    tile = %p.tile,
                    span = %report.span,
                    events = report.events_fired,
                    secs_per_sample = p.cost.estimate(),
                    "stint completed"
                );
                self.advance(pool, p)
            }
            StintStatus::AbortedByCallback { sample_id } => {
                p.rendered_through = sample_id;
                if sample_id >= self.total_samples {
                    // Nothing is left to render.
                    p.state = TileState::Finished;
                    tracing::debug!(tile = %p.tile, sample_id, "tile stopped at its last sample");
                } else {
                    p.state = TileState::Paused { at: sample_id };
                    tracing::debug!(tile = %p.tile, sample_id, "tile paused by callback");
                }
                Ok(false)
            }
            StintStatus::Fatal(err) => {
                p.rendered_through = report.rendered_through.unwrap_or(report.span.start());
                tracing::error!(tile = %p.tile, error = %err, "stint failed");
                p.state = TileState::Failed(err);
                Ok(false)
            }
        }
    }
}
