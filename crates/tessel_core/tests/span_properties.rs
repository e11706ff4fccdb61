//! Property tests for span splitting and stint execution.

use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use tessel_core::{
    CallbackFailure, EventAction, EventCallback, EventTable, NoopCallback, PlannedSpan,
    RenderFailure, SampleEngine, SampleId, SpanSplitter, StintExecutor, StintOutcome, TileId,
};

const LIMIT: SampleId = 512;

fn span_strategy() -> impl Strategy<Value = (SampleId, SampleId)> {
    (0..LIMIT).prop_flat_map(|s| (Just(s), (s + 1)..=LIMIT))
}

fn ids_strategy() -> impl Strategy<Value = Vec<SampleId>> {
    prop::collection::vec(1..=LIMIT, 1..40)
}

fn table(ids: &[SampleId]) -> EventTable {
    EventTable::register(ids.iter().copied(), Arc::new(NoopCallback), LIMIT).unwrap()
}

/// Counts every range it is asked to render.
#[derive(Default)]
struct CountingEngine {
    ranges: Mutex<Vec<(SampleId, SampleId)>>,
}

impl SampleEngine for CountingEngine {
    fn render_range(&self, _tile: TileId, start: SampleId, end: SampleId) -> Result<(), RenderFailure> {
        self.ranges.lock().unwrap().push((start, end));
        Ok(())
    }
}

/// Records callback IDs per tile.
#[derive(Default)]
struct SeenCallback {
    seen: Mutex<Vec<(TileId, SampleId)>>,
}

impl EventCallback for SeenCallback {
    fn on_event(&self, tile: TileId, sample_id: SampleId) -> Result<EventAction, CallbackFailure> {
        self.seen.lock().unwrap().push((tile, sample_id));
        Ok(EventAction::Continue)
    }
}

proptest! {
    #[test]
    fn split_covers_span_contiguously((s, e) in span_strategy(), ids in ids_strategy()) {
        let t = table(&ids);
        let subs = SpanSplitter::split(PlannedSpan::new(s, e).unwrap(), Some(&t));

        prop_assert!(!subs.is_empty());
        prop_assert_eq!(subs[0].start, s);
        prop_assert_eq!(subs[subs.len() - 1].end, e);
        for pair in subs.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
        for sub in &subs {
            prop_assert!(sub.start < sub.end);
        }
    }

    #[test]
    fn boundary_flag_iff_event_in_half_open_interior((s, e) in span_strategy(), ids in ids_strategy()) {
        let t = table(&ids);
        let subs = SpanSplitter::split(PlannedSpan::new(s, e).unwrap(), Some(&t));

        for sub in &subs {
            let expected = t.contains(sub.end) && sub.end > s && sub.end <= e;
            prop_assert_eq!(sub.is_event_boundary, expected);
        }
        let flagged: Vec<SampleId> = subs.iter().filter(|x| x.is_event_boundary).map(|x| x.end).collect();
        let expected: Vec<SampleId> = ids_sorted_in(&ids, s + 1, e);
        prop_assert_eq!(flagged, expected);
    }

    #[test]
    fn split_is_idempotent((s, e) in span_strategy(), ids in ids_strategy()) {
        let t = table(&ids);
        let span = PlannedSpan::new(s, e).unwrap();
        prop_assert_eq!(SpanSplitter::split(span, Some(&t)), SpanSplitter::split(span, Some(&t)));
    }

    #[test]
    fn no_events_in_range_means_no_split((s, e) in span_strategy(), ids in ids_strategy()) {
        let t = table(&ids);
        prop_assume!(ids_sorted_in(&ids, s + 1, e).is_empty());
        let subs = SpanSplitter::split(PlannedSpan::new(s, e).unwrap(), Some(&t));
        prop_assert_eq!(subs.len(), 1);
        prop_assert_eq!((subs[0].start, subs[0].end, subs[0].is_event_boundary), (s, e, false));
    }

    #[test]
    fn stints_over_consecutive_spans_fire_each_event_once(
        ids in ids_strategy(),
        stint in 1..64u32,
    ) {
        let callback = Arc::new(SeenCallback::default());
        let events = EventTable::register(ids.iter().copied(), callback.clone(), LIMIT).unwrap();
        let engine = CountingEngine::default();
        let mut exec = StintExecutor::new(TileId(9), &engine, Some(&events));

        let mut cursor = 0;
        while cursor < LIMIT {
            let end = (cursor + stint).min(LIMIT);
            let outcome = exec.execute(PlannedSpan::new(cursor, end).unwrap()).unwrap();
            prop_assert_eq!(outcome, StintOutcome::Completed);
            cursor = end;
        }

        let seen: Vec<SampleId> = callback.seen.lock().unwrap().iter().map(|&(_, id)| id).collect();
        prop_assert_eq!(seen, ids_sorted_in(&ids, 1, LIMIT));

        let ranges = engine.ranges.lock().unwrap();
        let rendered: u32 = ranges.iter().map(|&(a, b)| b - a).sum();
        prop_assert_eq!(rendered, LIMIT);
    }
}

fn ids_sorted_in(ids: &[SampleId], lo: SampleId, hi: SampleId) -> Vec<SampleId> {
    let mut v: Vec<SampleId> = ids.iter().copied().filter(|&id| id >= lo && id <= hi).collect();
    v.sort_unstable();
    v.dedup();
    v
}

#[test]
fn test_duplicate_ids_fire_once_each() {
    let callback = Arc::new(SeenCallback::default());
    let events = EventTable::register([30, 30, 70], callback.clone(), 100).unwrap();
    let engine = CountingEngine::default();
    let mut exec = StintExecutor::new(TileId(0), &engine, Some(&events));

    assert_eq!(exec.execute(PlannedSpan::new(0, 100).unwrap()), Ok(StintOutcome::Completed));
    assert_eq!(
        *callback.seen.lock().unwrap(),
        vec![(TileId(0), 30), (TileId(0), 70)]
    );
}

#[test]
fn test_executors_on_threads_share_one_table() {
    let callback = Arc::new(SeenCallback::default());
    let events = Arc::new(EventTable::register([16, 48], callback.clone(), 64).unwrap());
    let engine = Arc::new(CountingEngine::default());

    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let events = Arc::clone(&events);
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let mut exec = StintExecutor::new(TileId(t), engine.as_ref(), Some(events.as_ref()));
                let outcome = exec.execute(PlannedSpan::new(0, 64).unwrap()).unwrap();
                let plan = exec.plan().to_vec();
                (outcome, plan)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (outcome, plan) in &results {
        assert_eq!(*outcome, StintOutcome::Completed);
        assert_eq!(plan, &results[0].1);
    }

    let seen = callback.seen.lock().unwrap();
    assert_eq!(seen.len(), 16);
    for t in 0..8u32 {
        let per_tile: Vec<SampleId> = seen
            .iter()
            .filter(|(tile, _)| *tile == TileId(t))
            .map(|&(_, id)| id)
            .collect();
        assert_eq!(per_tile, vec![16, 48]);
    }
}
