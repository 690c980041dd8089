//! Time-of-day traffic aggregation for bike-share stations.
//!
//! Trips are bucketed once by departure and arrival minute; each query for a
//! ±60 minute window then reads only the buckets it needs and folds them into
//! per-station counts, radii and flow buckets for a map renderer.

pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod model;
pub mod output;
pub mod scales;
pub mod stations;
pub mod stats;
pub mod time_filter;
pub mod traffic;
pub mod trip_store;

pub use error::{Error, Result};
