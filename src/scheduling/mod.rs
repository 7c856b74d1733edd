pub mod availability;
pub mod coordinator;
pub mod filter;
pub mod interval;
mod lifecycle;
pub mod template;

pub use availability::{AvailabilityEngine, CandidateSlot, MentorAvailability};
pub use coordinator::BookingCoordinator;
pub use filter::BookingFilter;
pub use interval::{overlaps, TimeInterval};
pub use template::TemplateWindow;
