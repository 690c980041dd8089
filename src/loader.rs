//! Turns raw station JSON and trip CSV bytes into a queryable dataset.

use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::Read;
use tracing::{info, warn};

use crate::config::{LoadConfig, MalformedRowPolicy};
use crate::error::{Error, Result};
use crate::fetch::{BasicClient, read_source};
use crate::model::RawTrip;
use crate::stations::StationRegistry;
use crate::stats::IngestStats;
use crate::traffic::TrafficAggregator;
use crate::trip_store::TripStore;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Column spellings accepted for each required trip field.
const TRIP_COLUMNS: &[&[&str]] = &[
    &["start_station_id", "start station id"],
    &["end_station_id", "end station id"],
    &["started_at", "starttime"],
    &["ended_at", "stoptime"],
];

/// Stations and trips, loaded once and read-only afterwards.
#[derive(Debug)]
pub struct Dataset {
    pub registry: StationRegistry,
    pub store: TripStore,
    pub stats: IngestStats,
}

impl Dataset {
    pub fn aggregator(&self) -> TrafficAggregator<'_> {
        TrafficAggregator::new(&self.store, &self.registry)
    }
}

/// Parses a station document.
///
/// Accepts a bare array of records or an object holding one under
/// `data.stations` or `stations`.
pub fn parse_stations(bytes: &[u8], origin: &str) -> Result<StationRegistry> {
    let doc: Value = serde_json::from_slice(bytes).map_err(|e| Error::data_load(origin, e))?;

    let records = doc
        .as_array()
        .or_else(|| doc.pointer("/data/stations").and_then(Value::as_array))
        .or_else(|| doc.get("stations").and_then(Value::as_array))
        .ok_or_else(|| Error::data_load(origin, "no station array found"))?;

    let registry = StationRegistry::from_records(records);
    if registry.is_empty() {
        return Err(Error::data_load(origin, "no usable station records"));
    }
    if registry.len() < records.len() {
        warn!(
            kept = registry.len(),
            dropped = records.len() - registry.len(),
            "Some station records were dropped"
        );
    }
    Ok(registry)
}

/// Parses a trip CSV (optionally gzip-compressed) into a fresh store.
pub fn parse_trips(
    bytes: &[u8],
    origin: &str,
    policy: MalformedRowPolicy,
) -> Result<(TripStore, IngestStats)> {
    let decompressed;
    let bytes = if bytes.starts_with(&GZIP_MAGIC) {
        let mut buf = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut buf)
            .map_err(|e| Error::data_load(origin, e))?;
        decompressed = buf;
        decompressed.as_slice()
    } else {
        bytes
    };

    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(bytes);
    let headers = rdr.headers().map_err(|e| Error::data_load(origin, e))?;
    for spellings in TRIP_COLUMNS {
        match headers.iter().filter(|h| spellings.contains(h)).count() {
            0 => {
                return Err(Error::data_load(
                    origin,
                    format!("missing column {}", spellings[0]),
                ));
            }
            1 => {}
            _ => {
                return Err(Error::data_load(
                    origin,
                    format!("column {} appears under more than one name", spellings[0]),
                ));
            }
        }
    }

    let mut store = TripStore::new();
    let stats = store.ingest_rows(rdr.deserialize::<RawTrip>(), policy)?;
    if stats.rows > 0 && stats.ingested == 0 {
        return Err(Error::data_load(origin, "no trip rows could be parsed"));
    }
    Ok((store, stats))
}

/// Reads both sources concurrently and builds the dataset.
///
/// Any failure here is terminal: nothing is returned to query.
#[tracing::instrument(skip_all, fields(stations = %config.stations, trips = %config.trips))]
pub async fn load_dataset(config: &LoadConfig) -> Result<Dataset> {
    let client = BasicClient::new();
    let (station_bytes, trip_bytes) = tokio::try_join!(
        read_source(&client, &config.stations),
        read_source(&client, &config.trips),
    )?;

    let registry = parse_stations(&station_bytes, &config.stations)?;
    let (store, stats) = parse_trips(&trip_bytes, &config.trips, config.on_malformed)?;

    info!(
        stations = registry.len(),
        trips = store.len(),
        skipped = stats.skipped,
        skipped_pct = stats.skipped_pct(),
        "Dataset loaded"
    );

    Ok(Dataset {
        registry,
        store,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const TRIPS: &str = "\
ride_id,started_at,ended_at,start_station_id,end_station_id
r1,2024-06-01 00:05:00,2024-06-01 00:10:00,A,B
r2,2024-06-01 23:58:00,2024-06-02 00:02:00,B,A
r3,not a date,2024-06-01 00:10:00,A,B
";

    #[test]
    fn test_parse_stations_bare_array() {
        let json = br#"[{"id": "A", "lon": 0, "lat": 0}, {"id": "B", "Lon": 1, "Lat": 1}]"#;
        let registry = parse_stations(json, "stations.json").unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_parse_stations_nested_data() {
        let json = br#"{"data": {"stations": [{"short_name": "A32000", "lon": -71.06, "lat": 42.35}]}}"#;
        let registry = parse_stations(json, "stations.json").unwrap();
        assert!(registry.get("A32000").is_some());
    }

    #[test]
    fn test_parse_stations_invalid_json() {
        let err = parse_stations(b"<html>", "stations.json").unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }

    #[test]
    fn test_parse_stations_without_array() {
        let err = parse_stations(br#"{"data": {}}"#, "stations.json").unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }

    #[test]
    fn test_parse_stations_no_usable_records() {
        let err = parse_stations(br#"[{"name": "nowhere"}]"#, "stations.json").unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }

    #[test]
    fn test_parse_trips_skips_malformed() {
        let (store, stats) =
            parse_trips(TRIPS.as_bytes(), "trips.csv", MalformedRowPolicy::Skip).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_parse_trips_fail_policy() {
        let err = parse_trips(TRIPS.as_bytes(), "trips.csv", MalformedRowPolicy::Fail).unwrap_err();
        assert!(matches!(err, Error::MalformedTrip { row: 3, .. }));
    }

    #[test]
    fn test_parse_trips_legacy_headers() {
        let csv = "\
starttime,stoptime,start station id,end station id
2019-06-01 08:00:01.4650,2019-06-01 08:20:13.1010,72,79
";
        let (store, stats) =
            parse_trips(csv.as_bytes(), "trips.csv", MalformedRowPolicy::Fail).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(stats.ingested, 1);
    }

    #[test]
    fn test_parse_trips_missing_column() {
        let csv = "started_at,ended_at,start_station_id\n2024-06-01 00:05:00,2024-06-01 00:10:00,A\n";
        let err = parse_trips(csv.as_bytes(), "trips.csv", MalformedRowPolicy::Skip).unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }

    #[test]
    fn test_parse_trips_duplicate_column_spellings() {
        let csv = "\
started_at,starttime,ended_at,start_station_id,end_station_id
2024-06-01 00:05:00,2024-06-01 00:05:00,2024-06-01 00:10:00,A,B
";
        let err = parse_trips(csv.as_bytes(), "trips.csv", MalformedRowPolicy::Skip).unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }

    #[test]
    fn test_parse_trips_all_rows_malformed() {
        let csv = "\
started_at,ended_at,start_station_id,end_station_id
soon,later,A,B
2024-06-01 00:05:00,2024-06-01 00:10:00,,B
";
        let err = parse_trips(csv.as_bytes(), "trips.csv", MalformedRowPolicy::Skip).unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }

    #[test]
    fn test_parse_trips_header_only_is_empty() {
        let csv = "started_at,ended_at,start_station_id,end_station_id\n";
        let (store, stats) =
            parse_trips(csv.as_bytes(), "trips.csv", MalformedRowPolicy::Skip).unwrap();
        assert!(store.is_empty());
        assert_eq!(stats.rows, 0);
    }

    #[test]
    fn test_parse_trips_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(TRIPS.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let (store, _) =
            parse_trips(&compressed, "trips.csv.gz", MalformedRowPolicy::Skip).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_load_dataset_missing_source() {
        let config = LoadConfig::new("/no/such/stations.json", "/no/such/trips.csv");
        let err = load_dataset(&config).await.unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }
}
