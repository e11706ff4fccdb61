//! # Stint Error Types
//!
//! All errors that can occur while configuring events or executing a stint.
//!
//! A deliberate abort returned by an event callback is NOT an error. It is
//! reported through [`StintOutcome::AbortedByCallback`](crate::StintOutcome).

use crate::ids::{SampleId, TileId};
use thiserror::Error;

/// Failure reported by the external pixel-sampling engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct RenderFailure {
    /// Human readable cause.
    pub reason: String,
}

impl RenderFailure {
    /// Creates a render failure with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failure raised by an event callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct CallbackFailure {
    /// Human readable cause.
    pub reason: String,
}

impl CallbackFailure {
    /// Creates a callback failure with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by event registration, span construction, and stint execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StintError {
    /// Malformed event table. Rejected at setup time, never during a stint.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Planned span with `start >= end`.
    #[error("invalid span [{start}, {end})")]
    InvalidSpan {
        /// Requested start ID.
        start: SampleId,
        /// Requested (exclusive) end ID.
        end: SampleId,
    },

    /// The sampling engine failed for a sub-span. Fatal to the stint.
    #[error("{tile}: render of samples [{start}, {end}) failed: {source}")]
    Render {
        /// Tile whose stint failed.
        tile: TileId,
        /// First sample ID of the failed sub-span.
        start: SampleId,
        /// Exclusive end of the failed sub-span.
        end: SampleId,
        /// Engine-reported cause.
        #[source]
        source: RenderFailure,
    },

    /// The event callback raised an error. Fatal to the stint.
    #[error("{tile}: event callback at sample {sample_id} failed: {source}")]
    Callback {
        /// Tile whose stint failed.
        tile: TileId,
        /// Event sample ID the callback was invoked for.
        sample_id: SampleId,
        /// Callback-reported cause.
        #[source]
        source: CallbackFailure,
    },
}

impl StintError {
    /// Returns true for the two failure kinds raised while a stint is running.
    #[must_use]
    pub const fn is_runtime_failure(&self) -> bool {
        matches!(self, Self::Render { .. } | Self::Callback { .. })
    }
}

/// Result type for stint operations.
pub type StintResult<T> = Result<T, StintError>;
