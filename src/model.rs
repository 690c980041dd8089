//! Core records: stations, trips and the raw trip rows they are parsed from.

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Short, stable station identifier shared between stations and trips.
///
/// Backed by `Arc<str>` so every trip referencing a station clones a pointer,
/// not the string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(Arc<str>);

impl StationId {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StationId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for StationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A physical dock location. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Station {
    pub id: StationId,
    pub longitude: f64,
    pub latitude: f64,
}

impl Station {
    pub fn new(id: impl Into<StationId>, longitude: f64, latitude: f64) -> Self {
        Self {
            id: id.into(),
            longitude,
            latitude,
        }
    }
}

/// A single ride between two stations.
#[derive(Clone, Debug, PartialEq)]
pub struct Trip {
    pub start_station_id: StationId,
    pub end_station_id: StationId,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
}

impl Trip {
    /// Minute of day the trip departed, `0..1440`.
    pub fn start_minute(&self) -> usize {
        minutes_since_midnight(&self.started_at)
    }

    /// Minute of day the trip arrived, `0..1440`.
    pub fn end_minute(&self) -> usize {
        minutes_since_midnight(&self.ended_at)
    }
}

/// A trip row as it appears in the source CSV, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTrip {
    #[serde(alias = "start station id")]
    pub start_station_id: String,
    #[serde(alias = "end station id")]
    pub end_station_id: String,
    #[serde(alias = "starttime")]
    pub started_at: String,
    #[serde(alias = "stoptime")]
    pub ended_at: String,
}

impl RawTrip {
    /// Validates the row. `row` is only used for error reporting.
    pub fn into_trip(self, row: usize) -> Result<Trip> {
        let start = self.start_station_id.trim();
        let end = self.end_station_id.trim();
        if start.is_empty() || end.is_empty() {
            return Err(Error::malformed(row, "missing station id"));
        }

        let started_at = parse_timestamp(&self.started_at).ok_or_else(|| {
            Error::malformed(row, format!("unparsable start time {:?}", self.started_at))
        })?;
        let ended_at = parse_timestamp(&self.ended_at).ok_or_else(|| {
            Error::malformed(row, format!("unparsable end time {:?}", self.ended_at))
        })?;

        Ok(Trip {
            start_station_id: StationId::new(start),
            end_station_id: StationId::new(end),
            started_at,
            ended_at,
        })
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parses a trip timestamp. Offset-carrying timestamps keep their local wall-clock time.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// `hour * 60 + minute`; seconds are dropped.
pub fn minutes_since_midnight(t: &NaiveDateTime) -> usize {
    (t.hour() * 60 + t.minute()) as usize
}
