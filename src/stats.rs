use serde::Serialize;

/// Counters collected while ingesting a batch of trip rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub rows: usize,
    pub ingested: usize,
    pub skipped: usize,
}

impl IngestStats {
    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn skipped_pct(&self) -> f64 {
        Self::pct(self.skipped, self.rows)
    }

    pub(crate) fn record_ingested(&mut self) {
        self.rows += 1;
        self.ingested += 1;
    }

    pub(crate) fn record_skipped(&mut self) {
        self.rows += 1;
        self.skipped += 1;
    }
}
