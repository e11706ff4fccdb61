//! # Worker Pool
//!
//! Fixed set of worker threads executing one task per `(tile, stint)`.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──> worker 0 ──┐
//!   scheduler ────┼──> worker 1 ──┼──> [report channel] ──> scheduler
//!   (task channel)└──> worker N ──┘
//! ```
//!
//! Workers share the engine and the read-only event table through `Arc`s;
//! each task gets its own [`StintExecutor`], so no state is shared between
//! tiles besides those two. A task carries its tile's cost history in and
//! the report carries it back out. Dropping the pool closes the task channel
//! and joins every worker.

use crate::error::{SessionError, SessionResult};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tessel_core::{
    EventTable, PlannedSpan, RayCostEstimator, RenderFailure, SampleEngine, SampleId, StintError,
    StintExecutor, StintOutcome, TileId,
};

/// One unit of work: render `span` for `tile`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StintTask {
    /// Tile to render.
    pub tile: TileId,
    /// Planned sample range.
    pub span: PlannedSpan,
    /// Cost history of the tile's earlier stints.
    pub cost: RayCostEstimator,
}

impl StintTask {
    /// Task for `tile` with no cost history.
    #[must_use]
    pub fn new(tile: TileId, span: PlannedSpan) -> Self {
        Self {
            tile,
            span,
            cost: RayCostEstimator::new(),
        }
    }
}

/// Per-stint outcome as seen by the outer scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StintStatus {
    /// Whole span rendered.
    Completed,
    /// Callback stopped the stint after the event at `sample_id`.
    AbortedByCallback {
        /// Event ID whose callback aborted.
        sample_id: SampleId,
    },
    /// Render or callback failure.
    Fatal(StintError),
}

impl From<Result<StintOutcome, StintError>> for StintStatus {
    fn from(result: Result<StintOutcome, StintError>) -> Self {
        match result {
            Ok(StintOutcome::Completed) => Self::Completed,
            Ok(StintOutcome::AbortedByCallback { sample_id }) => Self::AbortedByCallback { sample_id },
            Err(err) => Self::Fatal(err),
        }
    }
}

/// Result of one task.
#[derive(Clone, Debug)]
pub struct StintReport {
    /// Tile that ran.
    pub tile: TileId,
    /// Span that was planned.
    pub span: PlannedSpan,
    /// How the stint ended.
    pub status: StintStatus,
    /// Exclusive end of the last sub-span rendered without failure.
    pub rendered_through: Option<SampleId>,
    /// Callbacks that returned during the stint.
    pub events_fired: usize,
    /// Cost history including this stint.
    pub cost: RayCostEstimator,
}

/// Fixed-size pool of stint workers.
pub struct WorkerPool {
    tasks: Option<Sender<StintTask>>,
    reports: Receiver<StintReport>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `threads` workers.
    ///
    /// # Arguments
    ///
    /// * `threads` - Worker count (at least 1)
    /// * `engine` - Pixel-sampling engine shared by all workers
    /// * `events` - Read-only event table, if the render registers events
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerPool`] for a zero thread count and
    /// [`SessionError::Io`] if a thread cannot be spawned.
    pub fn new(
        threads: usize,
        engine: Arc<dyn SampleEngine>,
        events: Option<Arc<EventTable>>,
    ) -> SessionResult<Self> {
        if threads == 0 {
            return Err(SessionError::WorkerPool("pool needs at least one worker".to_string()));
        }

        // Unbounded: the scheduler keeps at most one task per tile in flight.
        let (task_tx, task_rx) = unbounded::<StintTask>();
        let (report_tx, report_rx) = unbounded::<StintReport>();

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let tasks = task_rx.clone();
            let reports = report_tx.clone();
            let engine = Arc::clone(&engine);
            let events = events.clone();

            let handle = thread::Builder::new()
                .name(format!("tessel-worker-{index}"))
                .spawn(move || worker_loop(&tasks, &reports, engine.as_ref(), events.as_deref()))?;
            workers.push(handle);
        }

        tracing::debug!(threads, has_events = events.is_some(), "worker pool started");

        Ok(Self {
            tasks: Some(task_tx),
            reports: report_rx,
            workers,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queues a task.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerPool`] if every worker has exited.
    pub fn submit(&self, task: StintTask) -> SessionResult<()> {
        let Some(tasks) = &self.tasks else {
            return Err(SessionError::WorkerPool("pool is shut down".to_string()));
        };
        tasks
            .send(task)
            .map_err(|_| SessionError::WorkerPool("all workers have exited".to_string()))
    }

    /// Blocks until the next report arrives.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerPool`] if every worker has exited.
    pub fn recv(&self) -> SessionResult<StintReport> {
        self.reports
            .recv()
            .map_err(|_| SessionError::WorkerPool("all workers have exited".to_string()))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the task channel ends every worker loop.
        self.tasks = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked during shutdown");
            }
        }
        tracing::debug!("worker pool stopped");
    }
}

fn worker_loop(
    tasks: &Receiver<StintTask>,
    reports: &Sender<StintReport>,
    engine: &dyn SampleEngine,
    events: Option<&EventTable>,
) {
    while let Ok(task) = tasks.recv() {
        let report = run_task(task, engine, events);
        if reports.send(report).is_err() {
            break;
        }
    }
}

fn run_task(task: StintTask, engine: &dyn SampleEngine, events: Option<&EventTable>) -> StintReport {
    let mut exec = StintExecutor::with_cost(task.tile, engine, events, task.cost);
    let result = panic::catch_unwind(AssertUnwindSafe(|| exec.execute(task.span)));

    let status = match result {
        Ok(result) => StintStatus::from(result),
        // A panicking engine or callback must not leave the scheduler waiting.
        Err(_) => StintStatus::Fatal(StintError::Render {
            tile: task.tile,
            start: task.span.start(),
            end: task.span.end(),
            source: RenderFailure::new("worker panicked during stint"),
        }),
    };

    StintReport {
        tile: task.tile,
        span: task.span,
        status,
        rendered_through: exec.rendered_through(),
        events_fired: exec.events_fired(),
        cost: exec.into_cost(),
    }
}
