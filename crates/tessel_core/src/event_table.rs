//! # Special Event Table
//!
//! Immutable, ordered set of tile sample IDs at which custom logic must run,
//! plus the callback that runs it.
//!
//! ## Lifecycle
//!
//! 1. Built once per render configuration (e.g. per path-guiding stage set)
//! 2. Shared read-only (`Arc<EventTable>`) by every worker thread
//! 3. Destroyed with the render session
//!
//! A checkpoint resume rebuilds the table from persisted configuration, never
//! from render-time state. The table cannot be mutated: registering new events
//! means building a new table between render passes.
//!
//! ## Queries
//!
//! Backed by a `BTreeSet`, so [`EventTable::ids_in_range`] costs
//! `O(log n + k)` for `k` matching IDs rather than a scan of the whole table.

use crate::callback::{EventAction, EventCallback};
use crate::error::{CallbackFailure, StintError, StintResult};
use crate::ids::{SampleId, TileId};
use std::collections::btree_set::{self, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Ordered special-event sample IDs and their callback.
#[derive(Clone)]
pub struct EventTable {
    /// Unique event IDs, ascending.
    ids: BTreeSet<SampleId>,
    /// Invoked after each event ID is rendered.
    callback: Arc<dyn EventCallback>,
}

impl EventTable {
    /// Registers a set of event IDs with their callback.
    ///
    /// Duplicate IDs are silently collapsed.
    ///
    /// # Arguments
    ///
    /// * `ids` - Event sample IDs, in any order
    /// * `callback` - Hook executed once per event boundary per tile
    /// * `sample_limit` - Total tile samples of the render; valid IDs are `1..=sample_limit`
    ///
    /// # Errors
    ///
    /// Returns [`StintError::InvalidConfiguration`] if `ids` is empty or any ID
    /// lies outside `1..=sample_limit`.
    pub fn register<I>(
        ids: I,
        callback: Arc<dyn EventCallback>,
        sample_limit: SampleId,
    ) -> StintResult<Self>
    where
        I: IntoIterator<Item = SampleId>,
    {
        let mut table = BTreeSet::new();
        for id in ids {
            if id == 0 || id > sample_limit {
                return Err(StintError::InvalidConfiguration(format!(
                    "event sample id {id} outside render range 1..={sample_limit}"
                )));
            }
            table.insert(id);
        }

        if table.is_empty() {
            return Err(StintError::InvalidConfiguration(
                "event table needs at least one sample id".to_string(),
            ));
        }

        tracing::debug!(events = table.len(), sample_limit, "event table registered");

        Ok(Self {
            ids: table,
            callback,
        })
    }

    /// Returns true if `id` is a registered event.
    #[must_use]
    pub fn contains(&self, id: SampleId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns the registered IDs in `lo..=hi`, ascending.
    ///
    /// An inverted range (`lo > hi`) yields nothing.
    pub fn ids_in_range(&self, lo: SampleId, hi: SampleId) -> btree_set::Range<'_, SampleId> {
        if lo > hi {
            // Empty half-open range; BTreeSet::range panics on inverted bounds.
            return self.ids.range(0..0);
        }
        self.ids.range(lo..=hi)
    }

    /// Iterates every registered ID, ascending.
    pub fn iter(&self) -> btree_set::Iter<'_, SampleId> {
        self.ids.iter()
    }

    /// Number of distinct registered IDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if no IDs are registered; never the case after `register`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Smallest registered ID.
    #[must_use]
    pub fn first(&self) -> Option<SampleId> {
        self.ids.first().copied()
    }

    /// Largest registered ID.
    #[must_use]
    pub fn last(&self) -> Option<SampleId> {
        self.ids.last().copied()
    }

    /// Returns the registered callback.
    #[must_use]
    pub fn callback(&self) -> &dyn EventCallback {
        self.callback.as_ref()
    }

    /// Invokes the callback for `tile` at `sample_id`.
    ///
    /// # Errors
    ///
    /// Propagates the callback's own [`CallbackFailure`].
    pub fn fire(&self, tile: TileId, sample_id: SampleId) -> Result<EventAction, CallbackFailure> {
        self.callback.on_event(tile, sample_id)
    }
}

impl fmt::Debug for EventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTable")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for EventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventTable {{ total:{} ids:{{", self.ids.len())?;
        for (i, id) in self.ids.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str("} }")
    }
}
