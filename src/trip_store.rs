//! Minute-of-day bucket index over all ingested trips.
//!
//! Every trip lives once in an arena and is referenced by [`TripId`] from
//! exactly one departure slot (its start minute) and one arrival slot (its end
//! minute). Window queries read at most 120 slots instead of scanning every trip.

use std::fmt::Display;

use tracing::{debug, warn};

use crate::config::MalformedRowPolicy;
use crate::error::{Error, Result};
use crate::model::{RawTrip, Trip};
use crate::stats::IngestStats;
use crate::time_filter::{MINUTES_PER_DAY, TimeFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripId(usize);

/// Which end of a trip a bucket array is keyed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Departures,
    Arrivals,
}

#[derive(Debug, Clone)]
pub struct TripStore {
    trips: Vec<Trip>,
    departures_by_minute: Vec<Vec<TripId>>,
    arrivals_by_minute: Vec<Vec<TripId>>,
}

impl Default for TripStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TripStore {
    pub fn new() -> Self {
        Self {
            trips: Vec::new(),
            departures_by_minute: vec![Vec::new(); MINUTES_PER_DAY],
            arrivals_by_minute: vec![Vec::new(); MINUTES_PER_DAY],
        }
    }

    /// Parses one raw row and appends it to both bucket arrays.
    ///
    /// Parsing happens before any bucket is touched, so a malformed row leaves
    /// the store as it was.
    pub fn ingest(&mut self, raw: RawTrip, row: usize) -> Result<TripId> {
        let trip = raw.into_trip(row)?;
        Ok(self.insert(trip))
    }

    /// Appends an already-validated trip.
    pub fn insert(&mut self, trip: Trip) -> TripId {
        let id = TripId(self.trips.len());
        self.departures_by_minute[trip.start_minute()].push(id);
        self.arrivals_by_minute[trip.end_minute()].push(id);
        self.trips.push(trip);
        id
    }

    /// Ingests a batch of rows. Row numbers in errors and logs are 1-based.
    ///
    /// Rows that failed upstream (e.g. a CSV record error) arrive as `Err` and
    /// are treated as malformed. Under [`MalformedRowPolicy::Fail`] the batch
    /// is validated in full before anything is appended.
    pub fn ingest_rows<I, E>(
        &mut self,
        rows: I,
        policy: MalformedRowPolicy,
    ) -> Result<IngestStats>
    where
        I: IntoIterator<Item = std::result::Result<RawTrip, E>>,
        E: Display,
    {
        let mut stats = IngestStats::default();
        let parsed = rows.into_iter().enumerate().map(|(i, row)| {
            let row_number = i + 1;
            row.map_err(|e| Error::malformed(row_number, e))
                .and_then(|raw| raw.into_trip(row_number))
        });

        match policy {
            MalformedRowPolicy::Skip => {
                for result in parsed {
                    match result {
                        Ok(trip) => {
                            self.insert(trip);
                            stats.record_ingested();
                        }
                        Err(e) => {
                            warn!(error = %e, "Skipping malformed trip row");
                            stats.record_skipped();
                        }
                    }
                }
            }
            MalformedRowPolicy::Fail => {
                let trips = parsed.collect::<Result<Vec<_>>>()?;
                for trip in trips {
                    self.insert(trip);
                    stats.record_ingested();
                }
            }
        }

        debug!(
            rows = stats.rows,
            ingested = stats.ingested,
            skipped = stats.skipped,
            "Trip batch ingested"
        );
        Ok(stats)
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn trip(&self, id: TripId) -> &Trip {
        &self.trips[id.0]
    }

    /// The 1440 slots for one direction.
    pub fn slots(&self, direction: Direction) -> &[Vec<TripId>] {
        match direction {
            Direction::Departures => &self.departures_by_minute,
            Direction::Arrivals => &self.arrivals_by_minute,
        }
    }

    /// Ids of the trips whose departure (or arrival) minute falls inside the
    /// filter window.
    ///
    /// Slots are read in window order, each slot in insertion order.
    pub fn window_ids(
        &self,
        direction: Direction,
        filter: TimeFilter,
    ) -> impl Iterator<Item = TripId> + '_ {
        let slots = self.slots(direction);
        let (first, second) = filter.slot_ranges();
        slots[first]
            .iter()
            .chain(slots[second].iter())
            .flatten()
            .copied()
    }

    /// Trips in the filter window, in the order of [`TripStore::window_ids`].
    /// Reading never mutates the store.
    pub fn query_window(
        &self,
        direction: Direction,
        filter: TimeFilter,
    ) -> impl Iterator<Item = &Trip> + '_ {
        self.window_ids(direction, filter).map(move |id| self.trip(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_has_1440_empty_slots() {
        let store = TripStore::new();
        assert!(store.is_empty());
        assert_eq!(store.slots(Direction::Departures).len(), 1440);
        assert_eq!(store.slots(Direction::Arrivals).len(), 1440);
        assert!(store.slots(Direction::Departures).iter().all(Vec::is_empty));
    }

    #[test]
    fn test_ingest_buckets_by_start_and_end_minute() {
        let mut store = TripStore::new();
        let id = store
            .ingest(raw("A", "B", "2024-06-01 08:15:42", "2024-06-01 08:40:05"), 1)
            .unwrap();

        assert_eq!(store.slots(Direction::Departures)[495], vec![id]);
        assert_eq!(store.slots(Direction::Arrivals)[520], vec![id]);
    }

    #[test]
    fn test_bucket_completeness() {
        let store = sample_store();
        let deps: usize = store.slots(Direction::Departures).iter().map(Vec::len).sum();
        let arrs: usize = store.slots(Direction::Arrivals).iter().map(Vec::len).sum();

        assert_eq!(deps, store.len());
        assert_eq!(arrs, store.len());
    }

    #[test]
    fn test_slots_keep_insertion_order() {
        let mut store = TripStore::new();
        let first = store
            .ingest(raw("A", "B", "2024-06-01 10:00:05", "2024-06-01 10:20:00"), 1)
            .unwrap();
        let second = store
            .ingest(raw("C", "D", "2024-06-02 10:00:55", "2024-06-02 10:30:00"), 2)
            .unwrap();

        assert_eq!(store.slots(Direction::Departures)[600], vec![first, second]);
    }

    #[test]
    fn test_malformed_ingest_leaves_store_untouched() {
        let mut store = sample_store();
        let before = store.len();

        let result = store.ingest(raw("A", "B", "2024-06-01 08:00:00", "garbage"), 9);

        assert!(matches!(result, Err(Error::MalformedTrip { row: 9, .. })));
        assert_eq!(store.len(), before);
        let deps: usize = store.slots(Direction::Departures).iter().map(Vec::len).sum();
        assert_eq!(deps, before);
    }

    #[test]
    fn test_unfiltered_query_returns_every_trip() {
        let mut store = TripStore::new();
        let mut inserted = Vec::new();
        for (i, (start, end, started_at, ended_at)) in SAMPLE_ROWS.into_iter().enumerate() {
            inserted.push(store.ingest(raw(start, end, started_at, ended_at), i + 1).unwrap());
        }
        inserted.sort();

        for direction in [Direction::Departures, Direction::Arrivals] {
            let mut ids: Vec<_> = store.window_ids(direction, TimeFilter::None).collect();
            ids.sort();
            assert_eq!(ids, inserted, "{direction:?}");

            let trips: Vec<_> = store.query_window(direction, TimeFilter::None).collect();
            for id in &inserted {
                assert!(
                    trips.iter().any(|t| std::ptr::eq(*t, store.trip(*id))),
                    "{direction:?} is missing {id:?}"
                );
            }
        }
    }

    #[test]
    fn test_query_window_matches_window_ids() {
        let store = sample_store();
        let filter = TimeFilter::Minute(480);
        let by_id: Vec<_> = store
            .window_ids(Direction::Arrivals, filter)
            .map(|id| store.trip(id))
            .collect();
        let trips: Vec<_> = store.query_window(Direction::Arrivals, filter).collect();

        assert_eq!(trips, by_id);
        assert_eq!(trips.len(), 2);
    }

    #[test]
    fn test_unfiltered_query_is_in_slot_order() {
        let store = sample_store();
        let minutes: Vec<_> = store
            .query_window(Direction::Departures, TimeFilter::None)
            .map(Trip::start_minute)
            .collect();

        let mut sorted = minutes.clone();
        sorted.sort();
        assert_eq!(minutes, sorted);
    }

    #[test]
    fn test_midnight_wraparound() {
        let mut store = TripStore::new();
        store
            .ingest(raw("A", "B", "2024-06-01 23:50:00", "2024-06-01 23:55:00"), 1)
            .unwrap();
        store
            .ingest(raw("B", "C", "2024-06-01 00:50:00", "2024-06-01 00:59:00"), 2)
            .unwrap();
        store
            .ingest(raw("C", "A", "2024-06-01 03:20:00", "2024-06-01 03:40:00"), 3)
            .unwrap();

        let starts: Vec<_> = store
            .query_window(Direction::Departures, TimeFilter::Minute(30))
            .map(Trip::start_minute)
            .collect();

        assert_eq!(starts, vec![1430, 50]);
    }

    #[test]
    fn test_window_excludes_upper_bound_slot() {
        let mut store = TripStore::new();
        store
            .ingest(raw("A", "B", "2024-06-01 09:00:00", "2024-06-01 09:10:00"), 1)
            .unwrap();
        store
            .ingest(raw("A", "B", "2024-06-01 07:00:00", "2024-06-01 07:10:00"), 2)
            .unwrap();

        let found: Vec<_> = store
            .query_window(Direction::Departures, TimeFilter::Minute(480))
            .map(Trip::start_minute)
            .collect();

        assert_eq!(found, vec![420]);
    }

    #[test]
    fn test_window_size_matches_slot_sum() {
        let store = sample_store();
        for m in (0..1440).step_by(37) {
            let filter = TimeFilter::Minute(m);
            let (a, b) = filter.slot_ranges();
            let slots = store.slots(Direction::Arrivals);
            let expected: usize = slots[a].iter().chain(slots[b].iter()).map(Vec::len).sum();

            assert_eq!(store.query_window(Direction::Arrivals, filter).count(), expected);
        }
    }

    #[test]
    fn test_window_matches_linear_scan() {
        let store = sample_store();
        for m in (0..1440).step_by(13) {
            let filter = TimeFilter::Minute(m);
            let mut ids: Vec<_> = store.window_ids(Direction::Departures, filter).collect();
            ids.sort();
            let scanned: Vec<_> = (0..store.len())
                .map(TripId)
                .filter(|&id| filter.contains(store.trip(id).start_minute()))
                .collect();

            assert_eq!(ids, scanned, "minute {m}");
        }
    }

    #[test]
    fn test_query_is_idempotent() {
        let store = sample_store();
        let filter = TimeFilter::Minute(15);
        let first: Vec<_> = store.query_window(Direction::Departures, filter).collect();
        let second: Vec<_> = store.query_window(Direction::Departures, filter).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_ingest_rows_skip_policy() {
        let mut store = TripStore::new();
        let rows: Vec<std::result::Result<RawTrip, String>> = vec![
            Ok(raw("A", "B", "2024-06-01 08:00:00", "2024-06-01 08:20:00")),
            Ok(raw("A", "B", "bad", "2024-06-01 08:20:00")),
            Err("unequal lengths".to_string()),
            Ok(raw("B", "A", "2024-06-01 09:00:00", "2024-06-01 09:20:00")),
        ];

        let stats = store.ingest_rows(rows, MalformedRowPolicy::Skip).unwrap();

        assert_eq!(stats.rows, 4);
        assert_eq!(stats.ingested, 2);
        assert_eq!(stats.skipped, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ingest_rows_fail_policy_is_all_or_nothing() {
        let mut store = TripStore::new();
        let rows: Vec<std::result::Result<RawTrip, String>> = vec![
            Ok(raw("A", "B", "2024-06-01 08:00:00", "2024-06-01 08:20:00")),
            Ok(raw("A", "", "2024-06-01 08:10:00", "2024-06-01 08:20:00")),
        ];

        let err = store
            .ingest_rows(rows, MalformedRowPolicy::Fail)
            .unwrap_err();

        assert!(matches!(err, Error::MalformedTrip { row: 2, .. }));
        assert!(store.is_empty());
        assert!(store.slots(Direction::Departures).iter().all(Vec::is_empty));
    }

    const SAMPLE_ROWS: [(&str, &str, &str, &str); 6] = [
        ("A", "B", "2024-06-01 00:05:00", "2024-06-01 00:10:00"),
        ("B", "A", "2024-06-01 23:58:00", "2024-06-02 00:02:00"),
        ("A", "C", "2024-06-01 08:01:00", "2024-06-01 08:31:00"),
        ("C", "C", "2024-06-01 12:00:00", "2024-06-01 12:45:00"),
        ("B", "C", "2024-06-01 17:30:00", "2024-06-01 17:52:00"),
        ("C", "A", "2024-06-01 08:01:30", "2024-06-01 08:19:00"),
    ];

    fn sample_store() -> TripStore {
        let mut store = TripStore::new();
        for (i, (start, end, started_at, ended_at)) in SAMPLE_ROWS.into_iter().enumerate() {
            store.ingest(raw(start, end, started_at, ended_at), i + 1).unwrap();
        }
        store
    }

    fn raw(start: &str, end: &str, started_at: &str, ended_at: &str) -> RawTrip {
        RawTrip {
            start_station_id: start.to_string(),
            end_station_id: end.to_string(),
            started_at: started_at.to_string(),
            ended_at: ended_at.to_string(),
        }
    }
}
