//! # Render Session
//!
//! Wires a [`SessionConfig`] into a running render: tile grid, event table,
//! checkpoint coordinator, worker pool and scheduler.

use crate::checkpoint::{CheckpointCoordinator, CheckpointSink};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::pool::WorkerPool;
use crate::scheduler::{ResumeState, SessionSummary, TileScheduler};
use crate::tile::TileGrid;
use std::sync::Arc;
use tessel_core::{EventTable, SampleEngine, TileId};

/// A configured render over one image.
pub struct RenderSession {
    config: SessionConfig,
    grid: TileGrid,
    events: Option<Arc<EventTable>>,
    coordinator: Arc<CheckpointCoordinator>,
    scheduler: TileScheduler,
    pool: WorkerPool,
}

impl RenderSession {
    /// Builds a session and starts its worker pool.
    ///
    /// # Arguments
    ///
    /// * `config` - Session parameters
    /// * `engine` - Pixel-sampling engine for every tile of the config's grid
    /// * `sink` - Receives each checkpoint once every tile has reached it
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] for out-of-range values,
    /// [`SessionError::Stint`] if an event ID is outside `1..=total_samples`,
    /// and [`SessionError::Io`] if a worker cannot be spawned.
    pub fn new(
        config: SessionConfig,
        engine: Arc<dyn SampleEngine>,
        sink: Arc<dyn CheckpointSink>,
    ) -> SessionResult<Self> {
        config.validate()?;

        let grid = TileGrid::new(config.width, config.height, config.tile_size);
        if grid.is_empty() {
            return Err(SessionError::InvalidConfig("image has no tiles".to_string()));
        }

        let mut coordinator = CheckpointCoordinator::new(grid.len(), sink, config.events.stop_at);
        let pacing = config.pacing.snapshot_estimator();
        if let Some(estimator) = pacing.clone() {
            coordinator = coordinator.with_snapshot_estimator(estimator);
        }
        let coordinator = Arc::new(coordinator);

        let ids = config.event_ids();
        let events = if ids.is_empty() {
            None
        } else {
            let table = EventTable::register(ids, coordinator.clone(), config.total_samples)?;
            tracing::info!(events = %table, "session events ready");
            Some(Arc::new(table))
        };

        let mut scheduler = TileScheduler::new(config.total_samples, config.stint_samples)?;
        if pacing.is_some() {
            scheduler = scheduler.with_pacing(coordinator.clone());
        }
        let pool = WorkerPool::new(config.worker_threads, engine, events.clone())?;

        tracing::info!(
            width = config.width,
            height = config.height,
            tiles = grid.len(),
            total_samples = config.total_samples,
            stint_samples = config.stint_samples,
            threads = pool.threads(),
            paced = pacing.is_some(),
            "render session ready"
        );

        Ok(Self {
            config,
            grid,
            events,
            coordinator,
            scheduler,
            pool,
        })
    }

    /// Renders every tile from sample 0.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerPool`] if the pool stops answering.
    pub fn run(&self) -> SessionResult<SessionSummary> {
        let tiles: Vec<TileId> = self.grid.tiles().iter().map(|t| t.id).collect();
        self.scheduler.run(&self.pool, &tiles)
    }

    /// Continues a stopped render.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if `state` names a tile outside
    /// the grid, otherwise as [`RenderSession::run`].
    pub fn resume(&self, state: &ResumeState) -> SessionResult<SessionSummary> {
        if let Some(tile) = state.tiles().find(|&t| self.grid.get(t).is_none()) {
            return Err(SessionError::InvalidConfig(format!(
                "resume state names {tile}, grid has {} tiles",
                self.grid.len()
            )));
        }
        let skipped = self.grid.len() - state.len();
        if skipped > 0 {
            tracing::warn!(skipped, "tiles without a resume cursor are not rendered");
        }
        self.scheduler.resume(&self.pool, state)
    }

    /// Session parameters.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Tile partition of the image.
    #[must_use]
    pub const fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Registered events, if any.
    #[must_use]
    pub fn events(&self) -> Option<&EventTable> {
        self.events.as_deref()
    }

    /// Checkpoint coordinator receiving every event.
    #[must_use]
    pub fn coordinator(&self) -> &CheckpointCoordinator {
        &self.coordinator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemorySink;
    use crate::engine::AccumulationEngine;

    fn small_config() -> SessionConfig {
        SessionConfig {
            width: 32,
            height: 16,
            tile_size: 16,
            total_samples: 20,
            stint_samples: 8,
            worker_threads: 2,
            ..SessionConfig::default()
        }
    }

    fn engine(config: &SessionConfig) -> Arc<AccumulationEngine> {
        Arc::new(AccumulationEngine::new(
            &TileGrid::new(config.width, config.height, config.tile_size),
            1,
        ))
    }

    #[test]
    fn test_no_events_runs_without_table() {
        let config = small_config();
        let session = RenderSession::new(config.clone(), engine(&config), Arc::new(MemorySink::new())).unwrap();
        assert!(session.events().is_none());
        assert_eq!(session.grid().len(), 2);

        let summary = session.run().unwrap();
        assert!(summary.is_complete());
    }

    #[test]
    fn test_event_beyond_total_rejected() {
        let mut config = small_config();
        config.events.ids = vec![21];
        let result = RenderSession::new(config.clone(), engine(&config), Arc::new(MemorySink::new()));
        assert!(matches!(result, Err(SessionError::Stint(_))));
    }

    #[test]
    fn test_checkpoints_committed_in_order() {
        let mut config = small_config();
        config.events.ids = vec![5, 12];
        let sink = Arc::new(MemorySink::new());
        let session = RenderSession::new(config.clone(), engine(&config), sink.clone()).unwrap();

        assert!(session.run().unwrap().is_complete());
        assert_eq!(sink.committed(), vec![5, 12]);
        assert_eq!(session.coordinator().arrivals(12), 2);
        assert_eq!(session.coordinator().committed(), vec![5, 12]);
    }

    #[test]
    fn test_stop_at_last_sample_completes() {
        let mut config = small_config();
        config.events.stop_at = Some(20);
        let sink = Arc::new(MemorySink::new());
        let session = RenderSession::new(config.clone(), engine(&config), sink.clone()).unwrap();

        let summary = session.run().unwrap();
        assert!(summary.is_complete());
        assert_eq!(summary.paused(), 0);
        assert_eq!(sink.committed(), vec![20]);
    }

    #[test]
    fn test_paced_session_completes() {
        let mut config = small_config();
        config.pacing.interval_ms = Some(60_000);
        config.events.ids = vec![10];
        let sink = Arc::new(MemorySink::new());
        let session = RenderSession::new(config.clone(), engine(&config), sink.clone()).unwrap();
        assert_eq!(session.coordinator().snapshot_interval_secs(), Some(60.0));

        let summary = session.run().unwrap();
        assert!(summary.is_complete());
        assert_eq!(sink.committed(), vec![10]);
        for p in &summary.tiles {
            // Paced spans start at one sample, so more stints than 20 / 8.
            assert!(p.stints > 3);
        }
    }
}
