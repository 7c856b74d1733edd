pub mod booking;
pub mod rating;
pub mod user;

pub use booking::{BookedSlot, Booking, BookingStatus};
pub use rating::Rating;
pub use user::{AvailabilityTemplate, MentorSummary, Profile, RatingSummary, Role, User, WorkingHours};
