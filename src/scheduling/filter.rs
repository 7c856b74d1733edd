use chrono::{DateTime, Utc};

use crate::db::models::{Booking, BookingStatus};

use super::TimeInterval;

/// Typed description of a booking query.
///
/// Every populated field narrows the result; the persistence layer turns it into
/// a `WHERE` clause and `matches` evaluates the same predicate in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    pub mentor_id: Option<String>,
    pub mentee_id: Option<String>,
    /// Empty means any status.
    pub statuses: Vec<BookingStatus>,
    pub overlapping: Option<TimeInterval>,
    pub starts_at_or_after: Option<DateTime<Utc>>,
}

impl BookingFilter {
    pub fn for_mentor(mentor_id: impl Into<String>) -> Self {
        Self {
            mentor_id: Some(mentor_id.into()),
            ..Self::default()
        }
    }

    pub fn for_mentee(mentee_id: impl Into<String>) -> Self {
        Self {
            mentee_id: Some(mentee_id.into()),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[BookingStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn active(self) -> Self {
        self.with_statuses(&BookingStatus::ACTIVE)
    }

    pub fn overlapping(mut self, interval: TimeInterval) -> Self {
        self.overlapping = Some(interval);
        self
    }

    pub fn starting_from(mut self, from: DateTime<Utc>) -> Self {
        self.starts_at_or_after = Some(from);
        self
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(mentor_id) = &self.mentor_id {
            if &booking.mentor_id != mentor_id {
                return false;
            }
        }
        if let Some(mentee_id) = &self.mentee_id {
            if &booking.mentee_id != mentee_id {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&booking.status) {
            return false;
        }
        if let Some(interval) = &self.overlapping {
            if !interval.overlaps(&booking.interval) {
                return false;
            }
        }
        if let Some(from) = self.starts_at_or_after {
            if booking.interval.start < from {
                return false;
            }
        }
        true
    }
}
