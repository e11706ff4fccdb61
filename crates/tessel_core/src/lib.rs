//! # Tessel Core
//!
//! Sample-span scheduling for tiled progressive rendering.
//!
//! Worker threads advance tiles through successive tile sample-ID ranges
//! ("stints"). Some sample IDs are special: after a tile renders them, custom
//! logic must run (checkpoint snapshots, path-guiding stage changes). This
//! crate decides how each planned stint is split around those IDs and fires
//! the event callback exactly once per boundary crossed.
//!
//! ## Architecture Rules
//!
//! 1. **Pure splitting** - boundaries depend only on the span and the event table
//! 2. **Per-tile sequencing** - sub-spans of one stint never run in parallel
//! 3. **No cross-tile barrier** - coordinating tiles belongs to the callback owner
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tessel_core::{
//!     EventTable, NoopCallback, PlannedSpan, RenderFailure, SampleEngine, SampleId,
//!     StintExecutor, StintOutcome, TileId,
//! };
//!
//! struct Engine;
//!
//! impl SampleEngine for Engine {
//!     fn render_range(&self, _: TileId, _: SampleId, _: SampleId) -> Result<(), RenderFailure> {
//!         Ok(())
//!     }
//! }
//!
//! let events = EventTable::register([30, 70], Arc::new(NoopCallback), 100)?;
//! let mut exec = StintExecutor::new(TileId(0), &Engine, Some(&events));
//! assert_eq!(exec.execute(PlannedSpan::new(0, 100)?)?, StintOutcome::Completed);
//! assert_eq!(exec.plan().len(), 3);
//! # Ok::<(), tessel_core::StintError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod callback;
pub mod cost;
pub mod error;
pub mod event_table;
pub mod executor;
pub mod ids;
pub mod span;

pub use callback::{EventAction, EventCallback, NoopCallback, TracingCallback};
pub use cost::{CostRecord, RayCostEstimator, SnapshotEstimator, StintPacer};
pub use error::{CallbackFailure, RenderFailure, StintError, StintResult};
pub use event_table::EventTable;
pub use executor::{SampleEngine, StintExecutor, StintOutcome, StintState};
pub use ids::{SampleId, TileId};
pub use span::{PlannedSpan, SpanSplitter, SubSpan};
