//! Canonical station list and the per-query traffic overlay.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::model::{Station, StationId};

const ID_KEYS: &[&str] = &["short_name", "id", "station_id", "Number"];
const LON_KEYS: &[&str] = &["lon", "Lon", "Long", "lng", "longitude", "Longitude"];
const LAT_KEYS: &[&str] = &["lat", "Lat", "latitude", "Latitude"];

/// Immutable list of stations in source order, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    stations: Vec<Station>,
    index: HashMap<StationId, usize>,
}

impl StationRegistry {
    /// Builds the registry. Later duplicates of an id are dropped.
    pub fn new(stations: impl IntoIterator<Item = Station>) -> Self {
        let mut registry = Self::default();
        for station in stations {
            if registry.index.contains_key(&station.id) {
                warn!(station_id = %station.id, "Duplicate station id, keeping first");
                continue;
            }
            registry
                .index
                .insert(station.id.clone(), registry.stations.len());
            registry.stations.push(station);
        }
        registry
    }

    /// Normalizes loosely-keyed station records, skipping any without an id or coordinates.
    pub fn from_records(records: &[Value]) -> Self {
        Self::new(records.iter().enumerate().filter_map(|(i, record)| {
            let station = normalize_station(record);
            if station.is_none() {
                warn!(record = i, "Skipping station record without id or coordinates");
            }
            station
        }))
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.index.get(id).map(|&i| &self.stations[i])
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

/// Maps one source record onto [`Station`], whichever key spelling it uses.
pub fn normalize_station(record: &Value) -> Option<Station> {
    let id = first_present(record, ID_KEYS).and_then(as_id)?;
    let longitude = first_present(record, LON_KEYS).and_then(as_coordinate)?;
    let latitude = first_present(record, LAT_KEYS).and_then(as_coordinate)?;
    Some(Station::new(id, longitude, latitude))
}

fn first_present<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(key))
        .find(|v| !v.is_null())
}

fn as_id(value: &Value) -> Option<StationId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(StationId::new(s.trim())),
        Value::Number(n) => Some(StationId::new(number_id(n))),
        _ => None,
    }
}

/// Integral floats (`72.0`) print as integers so they match trip CSV ids.
fn number_id(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

fn as_coordinate(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    v.is_finite().then_some(v)
}

/// A station together with its traffic under one time filter.
///
/// Borrows the canonical station rather than copying or mutating it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StationTraffic<'a> {
    pub station: &'a Station,
    pub departures: u32,
    pub arrivals: u32,
    pub total_traffic: u32,
}

impl<'a> StationTraffic<'a> {
    pub fn new(station: &'a Station, departures: u32, arrivals: u32) -> Self {
        Self {
            station,
            departures,
            arrivals,
            total_traffic: departures + arrivals,
        }
    }

    pub fn id(&self) -> &'a StationId {
        &self.station.id
    }
}
