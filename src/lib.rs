//! Booking conflict resolution and mentor match scoring for a mentorship
//! marketplace.
//!
//! The crate is invoked by a host application's request handlers. It owns the
//! booking store (SQLite), the booking lifecycle, availability queries, mentor
//! ranking and rating aggregation. Authentication, profile editing and the
//! real-time session transport belong to the host.

pub mod db;
pub mod error;
pub mod matching;
pub mod ratings;
pub mod requester;
pub mod scheduling;
pub mod settings;
mod utils;

#[cfg(test)]
mod test_support;

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use log::info;

pub use db::{
    models::{
        AvailabilityTemplate, BookedSlot, Booking, BookingStatus, MentorSummary, Profile, Rating,
        RatingSummary, Role, User, WorkingHours,
    },
    Database,
};
pub use error::{BookingError, BookingResult};
pub use matching::{MatchScore, MatchScorer, MatchService, RankedMentor, ScoringWeights, SearchCriteria};
pub use ratings::{RatingAggregate, RatingLedger};
pub use requester::Requester;
pub use scheduling::{
    AvailabilityEngine, BookingCoordinator, BookingFilter, CandidateSlot, MentorAvailability,
    TimeInterval,
};
pub use settings::{EngineSettings, SettingsStore};

/// Initialises `env_logger`. Honours `RUST_LOG`, defaults to `info`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// Everything a host application needs, wired to one database and one settings file.
#[derive(Clone)]
pub struct MentorBook {
    pub db: Database,
    pub settings: Arc<SettingsStore>,
    pub bookings: BookingCoordinator,
    pub matching: MatchService,
    pub ratings: RatingLedger,
}

impl MentorBook {
    /// Opens (or creates) `mentorbook.sqlite3` and `settings.json` under `data_dir`.
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);
        let busy_timeout = Duration::from_millis(settings.snapshot().busy_timeout_ms);
        let db = Database::with_busy_timeout(data_dir.join("mentorbook.sqlite3"), busy_timeout)?;

        info!("MentorBook ready in {}", data_dir.display());
        Ok(Self::from_parts(db, settings))
    }

    pub fn from_parts(db: Database, settings: Arc<SettingsStore>) -> Self {
        Self {
            bookings: BookingCoordinator::new(db.clone()),
            matching: MatchService::new(db.clone(), settings.clone()),
            ratings: RatingLedger::new(db.clone()),
            db,
            settings,
        }
    }

    pub fn availability(&self) -> &AvailabilityEngine {
        self.bookings.availability()
    }

    /// Candidate slots using the configured default slot length.
    pub async fn candidate_slots(
        &self,
        mentor_id: &str,
        window: TimeInterval,
    ) -> BookingResult<Vec<CandidateSlot>> {
        let minutes = i64::from(self.settings.candidate_slot_minutes());
        self.availability()
            .candidate_slots(mentor_id, window, chrono::Duration::minutes(minutes))
            .await
    }
}
