use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::{
        models::{BookingStatus, Rating, Role},
        Database, RecordOutcome,
    },
    error::{BookingError, BookingResult},
    log_info,
    requester::Requester,
};

use super::RatingAggregate;

const ENABLE_LOGS: bool = true;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// Accepts one rating per completed booking and keeps mentor averages current.
#[derive(Clone)]
pub struct RatingLedger {
    db: Database,
}

impl RatingLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn submit(
        &self,
        requester: &Requester,
        booking_id: &str,
        score: u8,
        feedback: Option<String>,
    ) -> BookingResult<(Rating, RatingAggregate)> {
        requester.require_role(Role::Mentee, "rate mentors")?;
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(BookingError::Validation(format!(
                "rating must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
            )));
        }

        let booking = self
            .db
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking", booking_id))?;

        if booking.mentee_id != requester.id {
            return Err(BookingError::AccessDenied {
                booking_id: booking.id,
            });
        }
        if booking.status != BookingStatus::Completed {
            return Err(BookingError::Validation(format!(
                "booking {} is {}, only completed sessions can be rated",
                booking.id, booking.status
            )));
        }

        let rating = Rating {
            id: Uuid::new_v4().to_string(),
            booking_id: booking.id.clone(),
            mentor_id: booking.mentor_id.clone(),
            mentee_id: booking.mentee_id.clone(),
            score,
            feedback: feedback.filter(|f| !f.trim().is_empty()),
            created_at: Utc::now(),
        };

        match self.db.record_rating(&rating).await? {
            RecordOutcome::Recorded(aggregate) => {
                log_info!(
                    "Mentor {} rated {} for booking {} (average {:.2} over {})",
                    rating.mentor_id,
                    score,
                    rating.booking_id,
                    aggregate.average,
                    aggregate.count
                );
                Ok((rating, aggregate))
            }
            RecordOutcome::AlreadyRated => Err(BookingError::Validation(format!(
                "booking {} has already been rated",
                booking.id
            ))),
        }
    }

    /// Newest first.
    pub async fn list_for_mentor(&self, mentor_id: &str) -> BookingResult<Vec<Rating>> {
        Ok(self.db.list_ratings_for_mentor(mentor_id).await?)
    }
}
