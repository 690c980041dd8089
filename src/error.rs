//! Error types for loading and querying trip data.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A whole source could not be read or understood. Nothing is queryable afterwards.
    #[error("failed to load {origin}: {reason}")]
    DataLoad { origin: String, reason: String },

    /// A single trip row could not be turned into a trip.
    #[error("malformed trip at row {row}: {reason}")]
    MalformedTrip { row: usize, reason: String },

    #[error("time filter {0} is outside -1..=1439")]
    InvalidTimeFilter(i32),
}

impl Error {
    pub(crate) fn data_load(origin: impl Into<String>, reason: impl ToString) -> Self {
        Error::DataLoad {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(row: usize, reason: impl ToString) -> Self {
        Error::MalformedTrip {
            row,
            reason: reason.to_string(),
        }
    }
}
