//! Load-time configuration shared by the CLI and the loader.

use clap::ValueEnum;

/// What to do with a trip row that cannot be parsed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MalformedRowPolicy {
    /// Log the row, count it and keep going.
    #[default]
    Skip,
    /// Abort the whole batch on the first bad row, leaving the store untouched.
    Fail,
}

/// Where the two data sources live and how strictly to read them.
///
/// Sources are local file paths or `http(s)` URLs.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub stations: String,
    pub trips: String,
    pub on_malformed: MalformedRowPolicy,
}

impl LoadConfig {
    pub fn new(stations: impl Into<String>, trips: impl Into<String>) -> Self {
        Self {
            stations: stations.into(),
            trips: trips.into(),
            on_malformed: MalformedRowPolicy::default(),
        }
    }

    pub fn with_policy(mut self, on_malformed: MalformedRowPolicy) -> Self {
        self.on_malformed = on_malformed;
        self
    }
}
