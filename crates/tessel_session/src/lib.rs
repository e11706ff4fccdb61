//! # Tessel Session
//!
//! Drives a tiled progressive render on top of `tessel_core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────────────────┐
//! │ SessionConfig│──>│ RenderSession │──>│ TileScheduler            │
//! │   (TOML)     │   │ grid + events │   │ one stint in flight/tile │
//! └──────────────┘   └───────┬───────┘   └────────────┬─────────────┘
//!                            │                        │ StintTask
//!                            v                        v
//!                ┌───────────────────────┐   ┌──────────────────────┐
//!                │ CheckpointCoordinator │<──│ WorkerPool           │
//!                │ arrivals -> sink      │   │ StintExecutor / task │
//!                └───────────────────────┘   └──────────────────────┘
//! ```
//!
//! Event callbacks run on worker threads. The coordinator turns per-tile
//! arrivals into one checkpoint commit per event ID and can stop every tile
//! at a chosen event, leaving a [`ResumeState`] to continue from.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod scheduler;
pub mod session;
pub mod tile;

pub use checkpoint::{
    checkpoint_sample_ids, quality_steps, CheckpointCoordinator, CheckpointSink, LogSink, MemorySink,
};
pub use config::{EventConfig, PacingConfig, SessionConfig};
pub use engine::AccumulationEngine;
pub use error::{SessionError, SessionResult};
pub use pool::{StintReport, StintStatus, StintTask, WorkerPool};
pub use scheduler::{ResumeState, SessionSummary, TileProgress, TileScheduler, TileState};
pub use session::RenderSession;
pub use tile::{Tile, TileGrid};
