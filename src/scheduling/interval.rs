use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, BookingResult};

/// Half-open time range `[start, end)` in UTC.
///
/// Adjacent intervals (one ending exactly when the next begins) do not overlap.
/// Bounds are whole milliseconds, the precision the booking store keeps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    /// Builds an interval, rejecting empty or inverted ranges and bounds finer
    /// than a millisecond.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> BookingResult<Self> {
        for bound in [start, end] {
            if !is_whole_millis(bound) {
                return Err(BookingError::Validation(format!(
                    "interval bound {} has sub-millisecond precision",
                    bound.to_rfc3339()
                )));
            }
        }
        if start >= end {
            return Err(BookingError::Validation(format!(
                "interval start {} must be before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn starting_at(start: DateTime<Utc>, length: Duration) -> BookingResult<Self> {
        let end = start.checked_add_signed(length).ok_or_else(|| {
            BookingError::Validation(format!(
                "interval of {length} from {} is out of range",
                start.to_rfc3339()
            ))
        })?;
        Self::new(start, end)
    }

    /// Re-checks the ordering invariant for values built with a struct literal
    /// or deserialized from a request.
    pub fn validate(&self) -> BookingResult<()> {
        Self::new(self.start, self.end).map(|_| ())
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        overlaps(self, other)
    }
}

fn is_whole_millis(instant: DateTime<Utc>) -> bool {
    instant.timestamp_subsec_nanos() % 1_000_000 == 0
}

/// `[a0,a1)` and `[b0,b1)` overlap iff `a0 < b1 && b0 < a1`.
pub fn overlaps(a: &TimeInterval, b: &TimeInterval) -> bool {
    a.start < b.end && b.start < a.end
}
