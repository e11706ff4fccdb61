//! # Session Configuration
//!
//! Loaded once from TOML at session setup. Every field has a default, so an
//! empty file is a valid (small) render.
//!
//! ```toml
//! width = 256
//! height = 256
//! tile_size = 16
//! total_samples = 64
//! stint_samples = 16
//! worker_threads = 4
//!
//! [events]
//! ids = [8, 40]
//! checkpoint_files = 4
//! checkpoint_start = 0
//! stop_at = 40
//!
//! [pacing]
//! overhead_percent = 2
//! ```

use crate::checkpoint::checkpoint_sample_ids;
use crate::error::{SessionError, SessionResult};
use crate::tile::TileGrid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tessel_core::{SampleId, SnapshotEstimator};

/// Render session parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Tile sample IDs rendered per tile, `[0, total_samples)`.
    pub total_samples: SampleId,
    /// Length of one planned span.
    pub stint_samples: SampleId,
    /// Worker threads in the pool.
    pub worker_threads: usize,
    /// Special events.
    pub events: EventConfig,
    /// Time-based stint pacing.
    pub pacing: PacingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            tile_size: 16,
            total_samples: 64,
            stint_samples: 16,
            worker_threads: 4,
            events: EventConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

/// Special-event configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventConfig {
    /// Explicit event sample IDs.
    pub ids: Vec<SampleId>,
    /// Requested number of checkpoints, converted to event IDs.
    pub checkpoint_files: Option<u32>,
    /// Checkpoint events below this sample ID are skipped.
    pub checkpoint_start: Option<SampleId>,
    /// Event ID at which every tile aborts its stint.
    pub stop_at: Option<SampleId>,
}

/// Stint pacing against a snapshot interval. Off unless a field is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    /// Fixed snapshot interval in milliseconds. Wins over `overhead_percent`.
    pub interval_ms: Option<u64>,
    /// Snapshot cost budget as a percentage of render time.
    pub overhead_percent: Option<u32>,
}

impl PacingConfig {
    /// Snapshot estimator for these settings, or `None` when pacing is off.
    #[must_use]
    pub fn snapshot_estimator(&self) -> Option<SnapshotEstimator> {
        let interval = Duration::from_millis(self.interval_ms.unwrap_or(0)).as_secs_f64();
        let fraction = f64::from(self.overhead_percent.unwrap_or(0)) / 100.0;
        let estimator = SnapshotEstimator::new(interval, fraction);
        estimator.is_active().then_some(estimator)
    }
}

impl SessionConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Parse`] for malformed TOML and
    /// [`SessionError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> SessionResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the file cannot be read, plus every
    /// error of [`SessionConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading session config");
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> SessionResult<()> {
        let invalid = |msg: &str| Err(SessionError::InvalidConfig(msg.to_string()));

        if self.width == 0 || self.height == 0 {
            return invalid("image width and height must be non-zero");
        }
        if self.tile_size == 0 {
            return invalid("tile_size must be non-zero");
        }
        if TileGrid::tile_count(self.width, self.height, self.tile_size).is_none() {
            return Err(SessionError::InvalidConfig(format!(
                "{}x{} image in {}-pixel tiles has too many tiles",
                self.width, self.height, self.tile_size
            )));
        }
        if self.total_samples == 0 {
            return invalid("total_samples must be non-zero");
        }
        if self.stint_samples == 0 {
            return invalid("stint_samples must be non-zero");
        }
        if self.worker_threads == 0 {
            return invalid("worker_threads must be non-zero");
        }
        if let Some(stop_at) = self.events.stop_at {
            if stop_at == 0 || stop_at > self.total_samples {
                return Err(SessionError::InvalidConfig(format!(
                    "events.stop_at {stop_at} outside 1..={}",
                    self.total_samples
                )));
            }
        }
        if self.pacing.overhead_percent.is_some_and(|p| p > 100) {
            return invalid("pacing.overhead_percent must be at most 100");
        }
        Ok(())
    }

    /// Every event sample ID of the session, ascending and unique: explicit
    /// IDs, planned checkpoint IDs, and the stop ID.
    #[must_use]
    pub fn event_ids(&self) -> Vec<SampleId> {
        let mut ids: BTreeSet<SampleId> = self.events.ids.iter().copied().collect();
        if let Some(files) = self.events.checkpoint_files {
            ids.extend(checkpoint_sample_ids(
                self.total_samples,
                files,
                self.events.checkpoint_start.unwrap_or(0),
            ));
        }
        if let Some(stop_at) = self.events.stop_at {
            ids.insert(stop_at);
        }
        ids.into_iter().collect()
    }
}
