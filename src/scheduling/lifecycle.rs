use crate::db::models::BookingStatus;
use crate::error::{BookingError, BookingResult};

impl BookingStatus {
    /// Legal successor states.
    ///
    /// pending -> confirmed -> completed, pending -> cancelled, confirmed -> cancelled.
    /// Completed and cancelled bookings are final.
    pub fn allowed_transitions(&self) -> &'static [BookingStatus] {
        match self {
            BookingStatus::Pending => &[BookingStatus::Confirmed, BookingStatus::Cancelled],
            BookingStatus::Confirmed => &[BookingStatus::Completed, BookingStatus::Cancelled],
            BookingStatus::Cancelled | BookingStatus::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn ensure_transition(&self, next: BookingStatus) -> BookingResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(BookingError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }
}
