//! # Span Splitting
//!
//! Breaks one planned stint `[start, end)` into sub-spans whose boundaries
//! are the planned range plus every special-event ID strictly inside it.
//!
//! ## Rules
//!
//! ```text
//! planned:   [s ............................................. e)
//! events:         b0            b1                  b2
//! sub-spans: [s, b0)*      [b0, b1)*          [b1, b2)*    [b2, e)(* if e is an event)
//! ```
//!
//! - An event equal to `s` is ignored: it closed the previous stint.
//! - An event equal to `e` never splits, but flags the final sub-span.
//! - No events in `(s, e]` means one sub-span equal to the planned span.
//!
//! Splitting is a pure function of the span and the table, so any thread can
//! recompute identical boundaries, including after a checkpoint resume.

use crate::error::{StintError, StintResult};
use crate::event_table::EventTable;
use crate::ids::SampleId;
use std::fmt;

/// One scheduling unit the outer tile scheduler intends to run without interruption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlannedSpan {
    start: SampleId,
    end: SampleId,
}

impl PlannedSpan {
    /// Creates a planned span `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`StintError::InvalidSpan`] if `start >= end`.
    pub fn new(start: SampleId, end: SampleId) -> StintResult<Self> {
        if start >= end {
            return Err(StintError::InvalidSpan { start, end });
        }
        Ok(Self { start, end })
    }

    /// First sample ID of the span.
    #[must_use]
    pub const fn start(&self) -> SampleId {
        self.start
    }

    /// Exclusive end of the span.
    #[must_use]
    pub const fn end(&self) -> SampleId {
        self.end
    }

    /// Number of sample IDs covered.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Never true; a planned span covers at least one sample.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for PlannedSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A contiguous piece of a planned span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubSpan {
    /// First sample ID.
    pub start: SampleId,
    /// Exclusive end.
    pub end: SampleId,
    /// True iff `end` is a registered event that lies in `(planned.start, planned.end]`.
    pub is_event_boundary: bool,
}

impl SubSpan {
    /// Number of sample IDs covered.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Never true for splitter output.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for SubSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)?;
        if self.is_event_boundary {
            f.write_str("*")?;
        }
        Ok(())
    }
}

/// Pure planned-span splitter.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpanSplitter;

impl SpanSplitter {
    /// Splits `span` against `events`, returning the ordered sub-spans.
    #[must_use]
    pub fn split(span: PlannedSpan, events: Option<&EventTable>) -> Vec<SubSpan> {
        let mut out = Vec::new();
        Self::split_into(span, events, &mut out);
        out
    }

    /// Splits `span` against `events` into a reusable buffer.
    ///
    /// `out` is cleared first. Executors keep one buffer per tile so the common
    /// no-event path does not allocate after warm-up.
    pub fn split_into(span: PlannedSpan, events: Option<&EventTable>, out: &mut Vec<SubSpan>) {
        out.clear();
        let (s, e) = (span.start, span.end);

        let Some(table) = events else {
            out.push(SubSpan {
                start: s,
                end: e,
                is_event_boundary: false,
            });
            return;
        };

        let mut prev = s;
        // Interior only: (s, e). `s + 1 <= e` holds since s < e.
        for &b in table.ids_in_range(s + 1, e - 1) {
            out.push(SubSpan {
                start: prev,
                end: b,
                is_event_boundary: true,
            });
            prev = b;
        }

        out.push(SubSpan {
            start: prev,
            end: e,
            is_event_boundary: table.contains(e),
        });
    }

    /// Number of event boundaries `span` would cross, without building the split.
    #[must_use]
    pub fn boundary_count(span: PlannedSpan, events: Option<&EventTable>) -> usize {
        events.map_or(0, |table| table.ids_in_range(span.start + 1, span.end).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoopCallback;
    use std::sync::Arc;

    fn table(ids: &[SampleId]) -> EventTable {
        EventTable::register(ids.iter().copied(), Arc::new(NoopCallback), 10_000).unwrap()
    }

    fn sub(start: SampleId, end: SampleId, is_event_boundary: bool) -> SubSpan {
        SubSpan {
            start,
            end,
            is_event_boundary,
        }
    }

    #[test]
    fn test_invalid_span() {
        assert_eq!(
            PlannedSpan::new(5, 5),
            Err(StintError::InvalidSpan { start: 5, end: 5 })
        );
        assert!(PlannedSpan::new(6, 5).is_err());
    }

    #[test]
    fn test_split_with_duplicate_ids() {
        let t = table(&[30, 30, 70]);
        let span = PlannedSpan::new(0, 100).unwrap();
        assert_eq!(
            SpanSplitter::split(span, Some(&t)),
            vec![sub(0, 30, true), sub(30, 70, true), sub(70, 100, false)]
        );
        assert_eq!(SpanSplitter::boundary_count(span, Some(&t)), 2);
    }

    #[test]
    fn test_event_at_start_ignored_event_at_end_flagged() {
        let t = table(&[50, 70]);
        let span = PlannedSpan::new(50, 70).unwrap();
        assert_eq!(SpanSplitter::split(span, Some(&t)), vec![sub(50, 70, true)]);
        assert_eq!(SpanSplitter::boundary_count(span, Some(&t)), 1);
    }

    #[test]
    fn test_no_events_inside_is_trivial() {
        let t = table(&[10, 200]);
        let span = PlannedSpan::new(20, 100).unwrap();
        assert_eq!(SpanSplitter::split(span, Some(&t)), vec![sub(20, 100, false)]);
        assert_eq!(SpanSplitter::split(span, None), vec![sub(20, 100, false)]);
    }

    #[test]
    fn test_single_sample_span() {
        let t = table(&[4, 5]);
        assert_eq!(
            SpanSplitter::split(PlannedSpan::new(4, 5).unwrap(), Some(&t)),
            vec![sub(4, 5, true)]
        );
        assert_eq!(
            SpanSplitter::split(PlannedSpan::new(3, 4).unwrap(), Some(&t)),
            vec![sub(3, 4, true)]
        );
    }

    #[test]
    fn test_consecutive_events() {
        let t = table(&[1, 2, 3]);
        assert_eq!(
            SpanSplitter::split(PlannedSpan::new(0, 3).unwrap(), Some(&t)),
            vec![sub(0, 1, true), sub(1, 2, true), sub(2, 3, true)]
        );
    }

    #[test]
    fn test_split_into_reuses_buffer() {
        let t = table(&[30]);
        let mut buf = vec![sub(0, 1, false); 8];
        SpanSplitter::split_into(PlannedSpan::new(0, 64).unwrap(), Some(&t), &mut buf);
        assert_eq!(buf, vec![sub(0, 30, true), sub(30, 64, false)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(sub(30, 70, true).to_string(), "[30, 70)*");
        assert_eq!(PlannedSpan::new(0, 8).unwrap().to_string(), "[0, 8)");
    }
}
