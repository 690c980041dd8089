//! Time-of-day filter driven by the slider, and the bucket slots it selects.

use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};

pub const MINUTES_PER_DAY: usize = 1440;

/// Half-width of the window around the selected minute.
pub const WINDOW_HALF_WIDTH: usize = 60;

/// Slider value meaning "no filter".
pub const UNFILTERED: i32 = -1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TimeFilter {
    #[default]
    None,
    /// Minute of day, always `< 1440`.
    Minute(u16),
}

impl TimeFilter {
    /// Converts a slider value in `-1..=1439`.
    pub fn from_slider(value: i32) -> Result<Self> {
        match value {
            UNFILTERED => Ok(TimeFilter::None),
            v if (0..MINUTES_PER_DAY as i32).contains(&v) => Ok(TimeFilter::Minute(v as u16)),
            v => Err(Error::InvalidTimeFilter(v)),
        }
    }

    pub fn as_slider(&self) -> i32 {
        match self {
            TimeFilter::None => UNFILTERED,
            TimeFilter::Minute(m) => i32::from(*m),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TimeFilter::Minute(_))
    }

    /// Slot ranges to read, in order. The second range is empty unless the
    /// window straddles midnight.
    ///
    /// The window is `[m - 60, m + 60)` taken cyclically, always 120 slots wide.
    pub fn slot_ranges(&self) -> (Range<usize>, Range<usize>) {
        match *self {
            TimeFilter::None => (0..MINUTES_PER_DAY, 0..0),
            TimeFilter::Minute(m) => {
                let m = m as usize;
                let lo = (m + MINUTES_PER_DAY - WINDOW_HALF_WIDTH) % MINUTES_PER_DAY;
                let hi = (m + WINDOW_HALF_WIDTH) % MINUTES_PER_DAY;
                if lo <= hi {
                    (lo..hi, 0..0)
                } else {
                    (lo..MINUTES_PER_DAY, 0..hi)
                }
            }
        }
    }

    /// Whether a trip bucketed at `minute` falls inside the window.
    #[cfg(test)]
    pub(crate) fn contains(&self, minute: usize) -> bool {
        let (first, second) = self.slot_ranges();
        first.contains(&minute) || second.contains(&minute)
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeFilter::None => f.write_str("any time"),
            TimeFilter::Minute(m) => write!(f, "{:02}:{:02}", m / 60, m % 60),
        }
    }
}
