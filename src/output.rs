//! Marker records handed to a renderer, and their persistence.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use tracing::{debug, info};

use crate::traffic::Marker;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs markers using Rust's debug pretty-print format.
pub fn print_pretty(markers: &[Marker]) {
    debug!("{:#?}", markers);
}

/// Logs markers as pretty-printed JSON.
pub fn print_json(markers: &[Marker]) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(markers)?);
    Ok(())
}

/// Appends marker rows to a CSV file.
///
/// Creates the file with headers if it does not already exist. An empty slice
/// writes nothing, so the header lands with the first real rows.
pub fn append_markers(path: &str, markers: &[Marker]) -> Result<()> {
    if markers.is_empty() {
        return Ok(());
    }
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = markers.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for marker in markers {
        writer.serialize(marker)?;
    }
    writer.flush()?;

    Ok(())
}
