//! Per-station departure/arrival counts under a time filter.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::model::{Station, StationId, Trip};
use crate::scales::{RadiusScale, flow_ratio, quantize_flow};
use crate::stations::{StationRegistry, StationTraffic};
use crate::time_filter::TimeFilter;
use crate::trip_store::{Direction, TripStore};

/// Everything needed to draw one station marker under one time filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// Slider value the marker was computed for; `-1` when unfiltered.
    pub time_filter: i32,
    pub id: StationId,
    pub longitude: f64,
    pub latitude: f64,
    pub departures: u32,
    pub arrivals: u32,
    pub total_traffic: u32,
    pub radius: f64,
    /// Quantized departure share: 0, 0.5 or 1.
    pub flow: f64,
}

/// Counts trips in the filter window for every station in `stations`.
///
/// Output follows the order of `stations`, and every station is present, with
/// zeroes if nothing matched. Trips referencing unknown station ids count
/// towards nothing.
pub fn compute_station_traffic<'a>(
    store: &TripStore,
    stations: &'a [Station],
    filter: TimeFilter,
) -> Vec<StationTraffic<'a>> {
    let departures = count_by(
        store.query_window(Direction::Departures, filter),
        |t| &t.start_station_id,
    );
    let arrivals = count_by(
        store.query_window(Direction::Arrivals, filter),
        |t| &t.end_station_id,
    );

    stations
        .iter()
        .map(|station| {
            StationTraffic::new(
                station,
                departures.get(&station.id).copied().unwrap_or(0),
                arrivals.get(&station.id).copied().unwrap_or(0),
            )
        })
        .collect()
}

fn count_by<'t>(
    trips: impl Iterator<Item = &'t Trip>,
    key: impl Fn(&'t Trip) -> &'t StationId,
) -> HashMap<&'t StationId, u32> {
    let mut counts = HashMap::new();
    for trip in trips {
        *counts.entry(key(trip)).or_insert(0) += 1;
    }
    counts
}

/// Ties a trip store to a station registry and fixes the radius domain.
///
/// The domain is the largest unfiltered total, computed once, so marker sizes
/// stay comparable across filters.
#[derive(Debug, Clone, Copy)]
pub struct TrafficAggregator<'a> {
    store: &'a TripStore,
    registry: &'a StationRegistry,
    domain_max: u32,
}

impl<'a> TrafficAggregator<'a> {
    pub fn new(store: &'a TripStore, registry: &'a StationRegistry) -> Self {
        let domain_max = compute_station_traffic(store, registry.stations(), TimeFilter::None)
            .iter()
            .map(|s| s.total_traffic)
            .max()
            .unwrap_or(0);

        Self {
            store,
            registry,
            domain_max,
        }
    }

    pub fn domain_max(&self) -> u32 {
        self.domain_max
    }

    pub fn station_traffic(&self, filter: TimeFilter) -> Vec<StationTraffic<'a>> {
        let traffic = compute_station_traffic(self.store, self.registry.stations(), filter);
        debug!(
            %filter,
            stations = traffic.len(),
            total = traffic.iter().map(|s| u64::from(s.total_traffic)).sum::<u64>(),
            "Computed station traffic"
        );
        traffic
    }

    pub fn radius_scale(&self, filter: TimeFilter) -> RadiusScale {
        RadiusScale::for_filter(self.domain_max, filter)
    }

    /// Traffic plus visual encodings for every station, ready for a renderer.
    pub fn markers(&self, filter: TimeFilter) -> Vec<Marker> {
        let scale = self.radius_scale(filter);
        self.station_traffic(filter)
            .into_iter()
            .map(|traffic| Marker {
                time_filter: filter.as_slider(),
                id: traffic.station.id.clone(),
                longitude: traffic.station.longitude,
                latitude: traffic.station.latitude,
                departures: traffic.departures,
                arrivals: traffic.arrivals,
                total_traffic: traffic.total_traffic,
                radius: scale.radius(traffic.total_traffic),
                flow: quantize_flow(flow_ratio(traffic.departures, traffic.total_traffic)).value(),
            })
            .collect()
    }
}
