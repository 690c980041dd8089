//! Visual encodings for station markers: radius and flow color bucket.

use serde::Serialize;

use crate::time_filter::TimeFilter;

/// Output range when no time filter is active.
pub const UNFILTERED_RADIUS_RANGE: (f64, f64) = (0.0, 25.0);

/// Output range under any active filter. Filtered totals are much smaller,
/// so the range is boosted and starts at 3 to keep quiet stations visible.
pub const FILTERED_RADIUS_RANGE: (f64, f64) = (3.0, 50.0);

/// `min + sqrt(total / domain_max) * (max - min)`.
///
/// An empty domain (`domain_max == 0`) maps everything to `min`.
pub fn radius_scale(total_traffic: u32, domain_max: u32, range: (f64, f64)) -> f64 {
    let (min, max) = range;
    if domain_max == 0 {
        return min;
    }
    let t = (f64::from(total_traffic) / f64::from(domain_max)).sqrt();
    min + t * (max - min)
}

/// Square-root radius scale with a domain fixed across filters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusScale {
    domain_max: u32,
    range: (f64, f64),
}

impl RadiusScale {
    pub fn new(domain_max: u32, range: (f64, f64)) -> Self {
        Self { domain_max, range }
    }

    /// Picks the output range for `filter`. `domain_max` should come from the
    /// unfiltered totals so radii stay comparable while scrubbing.
    pub fn for_filter(domain_max: u32, filter: TimeFilter) -> Self {
        let range = if filter.is_active() {
            FILTERED_RADIUS_RANGE
        } else {
            UNFILTERED_RADIUS_RANGE
        };
        Self::new(domain_max, range)
    }

    pub fn radius(&self, total_traffic: u32) -> f64 {
        radius_scale(total_traffic, self.domain_max, self.range)
    }

    pub fn domain_max(&self) -> u32 {
        self.domain_max
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }
}

/// Share of a station's traffic that is departures. Stations without traffic read as balanced.
pub fn flow_ratio(departures: u32, total_traffic: u32) -> f64 {
    if total_traffic == 0 {
        0.5
    } else {
        f64::from(departures) / f64::from(total_traffic)
    }
}

/// Categorical flow encoding: thirds of the `[0, 1]` ratio domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowBucket {
    ArrivalHeavy,
    Balanced,
    DepartureHeavy,
}

impl FlowBucket {
    /// Quantized value fed to the color scale: 0, 0.5 or 1.
    pub fn value(&self) -> f64 {
        match self {
            FlowBucket::ArrivalHeavy => 0.0,
            FlowBucket::Balanced => 0.5,
            FlowBucket::DepartureHeavy => 1.0,
        }
    }
}

/// Buckets a flow ratio. Values outside `[0, 1]` are clamped; 1/3 and 2/3
/// fall into the upper bucket.
pub fn quantize_flow(ratio: f64) -> FlowBucket {
    match ratio * 3.0 {
        x if x >= 2.0 => FlowBucket::DepartureHeavy,
        x if x >= 1.0 => FlowBucket::Balanced,
        _ => FlowBucket::ArrivalHeavy,
    }
}
