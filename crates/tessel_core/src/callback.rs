//! # Event Callbacks
//!
//! The capability invoked after a tile finishes rendering a special-event
//! sample ID. Implementations are swappable (no-op, logger, checkpoint
//! coordinator) without the splitter or executor knowing the concrete type.
//!
//! ## Contract
//!
//! - Called from any worker thread, potentially concurrently for different tiles.
//! - Synchronous: the calling tile does not render further samples until it returns.
//! - `Ok(EventAction::Abort)` is a deliberate stop, NOT an error.
//! - `Err(CallbackFailure)` is fatal for the calling tile's stint.

use crate::error::CallbackFailure;
use crate::ids::{SampleId, TileId};

/// What the executor should do after an event callback returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventAction {
    /// Keep rendering the remaining sub-spans of this stint.
    Continue,
    /// Stop this tile's stint now and report an early termination.
    Abort,
}

impl EventAction {
    /// Maps the boolean callback convention (`true` = continue) onto an action.
    #[must_use]
    pub const fn from_continue(keep_going: bool) -> Self {
        if keep_going {
            Self::Continue
        } else {
            Self::Abort
        }
    }

    /// Returns true if rendering should proceed.
    #[must_use]
    pub const fn is_continue(self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// Special-event hook.
pub trait EventCallback: Send + Sync {
    /// Invoked once per event boundary crossed by `tile`, after every sample
    /// below `sample_id` has been rendered for that tile.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackFailure`] if the event logic itself failed.
    fn on_event(&self, tile: TileId, sample_id: SampleId) -> Result<EventAction, CallbackFailure>;
}

impl<F> EventCallback for F
where
    F: Fn(TileId, SampleId) -> Result<EventAction, CallbackFailure> + Send + Sync,
{
    fn on_event(&self, tile: TileId, sample_id: SampleId) -> Result<EventAction, CallbackFailure> {
        self(tile, sample_id)
    }
}

/// Callback that always continues.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCallback;

impl EventCallback for NoopCallback {
    fn on_event(&self, _tile: TileId, _sample_id: SampleId) -> Result<EventAction, CallbackFailure> {
        Ok(EventAction::Continue)
    }
}

/// Callback that logs every event and continues.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingCallback;

impl EventCallback for TracingCallback {
    fn on_event(&self, tile: TileId, sample_id: SampleId) -> Result<EventAction, CallbackFailure> {
        tracing::info!(tile = %tile, sample_id, "special event reached");
        Ok(EventAction::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_convention() {
        assert_eq!(EventAction::from_continue(true), EventAction::Continue);
        assert_eq!(EventAction::from_continue(false), EventAction::Abort);
        assert!(!EventAction::Abort.is_continue());
    }

    #[test]
    fn test_closure_is_a_callback() {
        let stop_at_64 = |_tile: TileId, id: SampleId| {
            Ok::<_, CallbackFailure>(EventAction::from_continue(id != 64))
        };
        assert_eq!(stop_at_64.on_event(TileId(0), 32), Ok(EventAction::Continue));
        assert_eq!(stop_at_64.on_event(TileId(0), 64), Ok(EventAction::Abort));
    }

    #[test]
    fn test_builtin_callbacks_continue() {
        assert_eq!(NoopCallback.on_event(TileId(1), 10), Ok(EventAction::Continue));
        assert_eq!(TracingCallback.on_event(TileId(1), 10), Ok(EventAction::Continue));
    }
}
