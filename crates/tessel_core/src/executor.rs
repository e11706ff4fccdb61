//! # Stint Executor
//!
//! Drives one tile through one planned span: split once, then render each
//! sub-span in order and fire the event callback after every event boundary.
//!
//! ## State Machine
//!
//! ```text
//! Idle ─▶ Splitting ─▶ Rendering(sub) ─┬─▶ CallbackPending(id) ─┬─ Continue ─▶ Rendering(next) | Completed
//!                                      │                        ├─ Abort ────▶ AbortedByCallback
//!                                      │                        └─ Err ──────▶ Fatal
//!                                      ├─▶ Rendering(next) | Completed   (not a boundary)
//!                                      └─ Err ──────────────────────────▶ Fatal
//! ```
//!
//! Sub-spans of one stint are never processed in parallel: a callback must
//! observe every sample below its event ID already rendered.

use crate::cost::RayCostEstimator;
use crate::error::{RenderFailure, StintError, StintResult};
use crate::event_table::EventTable;
use crate::ids::{SampleId, TileId};
use crate::span::{PlannedSpan, SpanSplitter, SubSpan};
use std::time::Instant;

/// External pixel-sampling engine.
pub trait SampleEngine: Send + Sync {
    /// Renders every sample ID in `[start, end)` for `tile`, mutating only that
    /// tile's accumulation state.
    ///
    /// The executor never asks for the same range twice.
    ///
    /// # Errors
    ///
    /// Returns [`RenderFailure`] if the range could not be rendered.
    fn render_range(&self, tile: TileId, start: SampleId, end: SampleId) -> Result<(), RenderFailure>;
}

/// Per-tile stint state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StintState {
    /// No active stint.
    #[default]
    Idle,
    /// Planned span being split.
    Splitting,
    /// Sampling engine running on a sub-span.
    Rendering(SubSpan),
    /// Event callback running for a boundary ID.
    CallbackPending(SampleId),
    /// Planned span fully rendered.
    Completed,
    /// Callback asked to stop at this event ID.
    AbortedByCallback(SampleId),
    /// Render or callback failure ended the stint.
    Fatal,
}

impl StintState {
    /// True for the three end states of a stint.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::AbortedByCallback(_) | Self::Fatal)
    }
}

/// Successful end of a stint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StintOutcome {
    /// Every sub-span was rendered.
    Completed,
    /// The callback returned abort after the event at `sample_id`; samples
    /// up to `sample_id` are rendered, nothing after.
    AbortedByCallback {
        /// Event ID whose callback aborted.
        sample_id: SampleId,
    },
}

/// Sequential render/callback loop for one tile.
///
/// One executor belongs to one worker thread at a time. The only state it
/// shares with other tiles is the read-only [`EventTable`].
pub struct StintExecutor<'a, E: SampleEngine + ?Sized> {
    tile: TileId,
    engine: &'a E,
    events: Option<&'a EventTable>,
    state: StintState,
    /// Split of the current stint; reused across stints.
    plan: Vec<SubSpan>,
    /// Exclusive end of the last fully rendered sub-span.
    rendered_through: Option<SampleId>,
    events_fired: usize,
    cost: RayCostEstimator,
}

impl<'a, E: SampleEngine + ?Sized> StintExecutor<'a, E> {
    /// Creates an idle executor for `tile`.
    ///
    /// # Arguments
    ///
    /// * `tile` - Tile this executor renders
    /// * `engine` - Pixel-sampling engine
    /// * `events` - Special events, or `None` when the render registers none
    #[must_use]
    pub fn new(tile: TileId, engine: &'a E, events: Option<&'a EventTable>) -> Self {
        Self::with_cost(tile, engine, events, RayCostEstimator::new())
    }

    /// Creates an idle executor that continues an existing cost history,
    /// typically the one left by the tile's previous stint.
    #[must_use]
    pub fn with_cost(
        tile: TileId,
        engine: &'a E,
        events: Option<&'a EventTable>,
        cost: RayCostEstimator,
    ) -> Self {
        Self {
            tile,
            engine,
            events,
            state: StintState::Idle,
            plan: Vec::with_capacity(4),
            rendered_through: None,
            events_fired: 0,
            cost,
        }
    }

    /// Tile this executor renders.
    #[must_use]
    pub const fn tile(&self) -> TileId {
        self.tile
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> StintState {
        self.state
    }

    /// Sub-spans of the current (or last) stint.
    #[must_use]
    pub fn plan(&self) -> &[SubSpan] {
        &self.plan
    }

    /// Exclusive end of the last sub-span rendered without failure in the
    /// current (or last) stint.
    #[must_use]
    pub const fn rendered_through(&self) -> Option<SampleId> {
        self.rendered_through
    }

    /// Callbacks that returned (continue or abort) during the current (or last) stint.
    #[must_use]
    pub const fn events_fired(&self) -> usize {
        self.events_fired
    }

    /// Per-sample render cost history.
    #[must_use]
    pub const fn cost(&self) -> &RayCostEstimator {
        &self.cost
    }

    /// Consumes the executor, handing back its cost history.
    #[must_use]
    pub fn into_cost(self) -> RayCostEstimator {
        self.cost
    }

    /// Runs one stint over `span`.
    ///
    /// # Errors
    ///
    /// - [`StintError::Render`] if the engine failed; the failing sub-span's
    ///   callback is not invoked and later sub-spans are not rendered.
    /// - [`StintError::Callback`] if the callback raised a failure.
    ///
    /// A callback returning abort is `Ok(StintOutcome::AbortedByCallback)`.
    pub fn execute(&mut self, span: PlannedSpan) -> StintResult<StintOutcome> {
        debug_assert!(
            !matches!(self.state, StintState::Rendering(_) | StintState::CallbackPending(_)),
            "stint started while another is active"
        );

        self.transition(StintState::Splitting);
        SpanSplitter::split_into(span, self.events, &mut self.plan);
        self.rendered_through = None;
        self.events_fired = 0;

        tracing::debug!(
            tile = %self.tile,
            span = %span,
            sub_spans = self.plan.len(),
            "stint split"
        );

        for index in 0..self.plan.len() {
            let sub = self.plan[index];
            self.render(sub)?;

            if !sub.is_event_boundary {
                continue;
            }
            if let Some(outcome) = self.fire(sub.end)? {
                return Ok(outcome);
            }
        }

        self.transition(StintState::Completed);
        Ok(StintOutcome::Completed)
    }

    fn render(&mut self, sub: SubSpan) -> StintResult<()> {
        self.transition(StintState::Rendering(sub));
        tracing::trace!(tile = %self.tile, sub_span = %sub, "rendering sub-span");

        let started = Instant::now();
        if let Err(source) = self.engine.render_range(self.tile, sub.start, sub.end) {
            self.transition(StintState::Fatal);
            tracing::warn!(tile = %self.tile, sub_span = %sub, error = %source, "render failed");
            return Err(StintError::Render {
                tile: self.tile,
                start: sub.start,
                end: sub.end,
                source,
            });
        }
        self.cost.push(started.elapsed(), sub.start, sub.end);
        self.rendered_through = Some(sub.end);
        Ok(())
    }

    /// Returns `Some(outcome)` when the stint must stop here.
    fn fire(&mut self, sample_id: SampleId) -> StintResult<Option<StintOutcome>> {
        // Boundaries are only produced from a table.
        let Some(table) = self.events else {
            return Ok(None);
        };

        self.transition(StintState::CallbackPending(sample_id));
        let action = match table.fire(self.tile, sample_id) {
            Ok(action) => action,
            Err(source) => {
                self.transition(StintState::Fatal);
                tracing::warn!(tile = %self.tile, sample_id, error = %source, "event callback failed");
                return Err(StintError::Callback {
                    tile: self.tile,
                    sample_id,
                    source,
                });
            }
        };
        self.events_fired += 1;

        if action.is_continue() {
            return Ok(None);
        }

        self.transition(StintState::AbortedByCallback(sample_id));
        tracing::info!(tile = %self.tile, sample_id, "stint aborted by event callback");
        Ok(Some(StintOutcome::AbortedByCallback { sample_id }))
    }

    fn transition(&mut self, next: StintState) {
        tracing::trace!(tile = %self.tile, from = ?self.state, to = ?next, "stint state");
        self.state = next;
    }
}
