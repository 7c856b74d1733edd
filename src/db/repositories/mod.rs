pub mod bookings;
pub mod ratings;
pub mod users;

pub use bookings::{InsertOutcome, StartOrder};
pub use ratings::RecordOutcome;
