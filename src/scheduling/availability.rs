use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::{
        models::{BookedSlot, Booking, BookingStatus, User, WorkingHours},
        Database, StartOrder,
    },
    error::{BookingError, BookingResult},
    log_debug,
};

use super::{BookingFilter, TemplateWindow, TimeInterval};

const ENABLE_LOGS: bool = true;

/// Upper bound on the slots one `candidate_slots` call may walk.
pub const MAX_CANDIDATE_SLOTS: i64 = 5_000;

/// A mentor's advisory template alongside the time already taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorAvailability {
    pub mentor_id: String,
    pub timezone: String,
    pub working_hours: Option<WorkingHours>,
    pub days_available: Vec<String>,
    pub booked_slots: Vec<BookedSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSlot {
    pub interval: TimeInterval,
    /// None when the mentor's template could not be evaluated.
    pub within_working_hours: Option<bool>,
}

/// Answers "is this interval free?" against pending and confirmed bookings.
///
/// The working-hours template is surfaced to callers and used to annotate
/// candidates, but it never rejects an interval.
#[derive(Clone)]
pub struct AvailabilityEngine {
    db: Database,
}

impl AvailabilityEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn is_free(&self, mentor_id: &str, interval: TimeInterval) -> BookingResult<bool> {
        Ok(self.find_conflict(mentor_id, interval).await?.is_none())
    }

    /// Some pending or confirmed booking of `mentor_id` overlapping `interval`.
    pub async fn find_conflict(
        &self,
        mentor_id: &str,
        interval: TimeInterval,
    ) -> BookingResult<Option<Booking>> {
        interval.validate()?;
        Ok(self
            .db
            .find_overlapping(mentor_id, interval, &BookingStatus::ACTIVE)
            .await?)
    }

    /// Pending and confirmed bookings starting at or after `from`, earliest first.
    pub async fn list_booked_slots(
        &self,
        mentor_id: &str,
        from: DateTime<Utc>,
    ) -> BookingResult<Vec<BookedSlot>> {
        let filter = BookingFilter::for_mentor(mentor_id).active().starting_from(from);
        let bookings = self.db.find_bookings(filter, StartOrder::Ascending).await?;
        Ok(bookings.iter().map(BookedSlot::from).collect())
    }

    pub async fn availability(
        &self,
        mentor_id: &str,
        from: DateTime<Utc>,
    ) -> BookingResult<MentorAvailability> {
        let mentor = self.load_mentor(mentor_id).await?;
        let booked_slots = self.list_booked_slots(mentor_id, from).await?;
        let template = mentor.profile.and_then(|p| p.availability).unwrap_or_default();

        Ok(MentorAvailability {
            mentor_id: mentor.id,
            timezone: template.timezone.unwrap_or_else(|| "UTC".to_string()),
            working_hours: template.working_hours,
            days_available: template.days_available,
            booked_slots,
        })
    }

    /// Conflict-free slots of `slot_length` tiling `window` from its start.
    pub async fn candidate_slots(
        &self,
        mentor_id: &str,
        window: TimeInterval,
        slot_length: Duration,
    ) -> BookingResult<Vec<CandidateSlot>> {
        window.validate()?;
        if slot_length <= Duration::zero() || slot_length.subsec_nanos() % 1_000_000 != 0 {
            return Err(BookingError::Validation(
                "slot length must be a positive whole number of milliseconds".to_string(),
            ));
        }
        let mentor = self.load_mentor(mentor_id).await?;
        let template_window = mentor
            .profile
            .as_ref()
            .and_then(|p| p.availability.as_ref())
            .and_then(TemplateWindow::from_template);

        if slot_length > window.duration() {
            return Ok(Vec::new());
        }
        let steps = window.duration().num_milliseconds() / slot_length.num_milliseconds();
        if steps > MAX_CANDIDATE_SLOTS {
            return Err(BookingError::Validation(format!(
                "window holds {steps} slots, at most {MAX_CANDIDATE_SLOTS} are allowed"
            )));
        }

        let filter = BookingFilter::for_mentor(mentor_id).active().overlapping(window);
        let taken = self.db.find_bookings(filter.clone(), StartOrder::Ascending).await?;

        // slot_length fits in the window, so every step below stays inside it.
        let last_start = window.end - slot_length;
        let mut candidates = Vec::new();
        let mut start = window.start;
        while start <= last_start {
            let slot = TimeInterval {
                start,
                end: start + slot_length,
            };
            let slot_filter = filter.clone().overlapping(slot);
            if !taken.iter().any(|b| slot_filter.matches(b)) {
                candidates.push(CandidateSlot {
                    interval: slot,
                    within_working_hours: template_window.as_ref().map(|w| w.contains(&slot)),
                });
            }
            start = slot.end;
        }

        log_debug!(
            "{} candidate slots for mentor {} ({} bookings in window)",
            candidates.len(),
            mentor_id,
            taken.len()
        );

        Ok(candidates)
    }

    async fn load_mentor(&self, mentor_id: &str) -> BookingResult<User> {
        match self.db.get_user(mentor_id).await? {
            Some(user) if user.is_mentor() => Ok(user),
            _ => Err(BookingError::not_found("mentor", mentor_id)),
        }
    }
}
