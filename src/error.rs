use thiserror::Error;

use crate::db::models::BookingStatus;

/// Errors surfaced by the booking, matching and rating services.
///
/// Every variant except `Storage` is a terminal domain outcome; none of them is
/// transient, so callers should not retry.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("role violation: {0}")]
    RoleViolation(String),

    #[error("requested interval conflicts with booking {conflicting_id}")]
    SlotConflict { conflicting_id: String },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("access denied to booking {booking_id}")]
    AccessDenied { booking_id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        BookingError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
