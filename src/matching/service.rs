use std::sync::Arc;

use crate::{
    db::{
        models::{MentorSummary, Role},
        Database,
    },
    error::{BookingError, BookingResult},
    log_debug,
    requester::Requester,
    settings::SettingsStore,
};

use super::{ranking, MatchScorer, RankedMentor, ScoringFactor, SearchCriteria};

const ENABLE_LOGS: bool = false;

/// Runs the ranking pass over the stored mentor pool.
///
/// Weights are read from settings on every call so updates apply immediately.
#[derive(Clone)]
pub struct MatchService {
    db: Database,
    settings: Arc<SettingsStore>,
    extra_factors: Vec<Arc<dyn ScoringFactor>>,
}

impl MatchService {
    pub fn new(db: Database, settings: Arc<SettingsStore>) -> Self {
        Self {
            db,
            settings,
            extra_factors: Vec::new(),
        }
    }

    pub fn with_factor(mut self, factor: impl ScoringFactor + 'static) -> Self {
        self.extra_factors.push(Arc::new(factor));
        self
    }

    pub fn scorer(&self) -> MatchScorer {
        self.extra_factors
            .iter()
            .cloned()
            .fold(MatchScorer::new(&self.settings.scoring_weights()), |scorer, factor| {
                scorer.with_shared_factor(factor)
            })
    }

    pub async fn suggest(&self, requester: &Requester) -> BookingResult<Vec<RankedMentor>> {
        requester.require_role(Role::Mentee, "request mentor suggestions")?;
        let mentee = self
            .db
            .get_user(&requester.id)
            .await?
            .filter(|u| u.role == Role::Mentee)
            .ok_or_else(|| BookingError::not_found("mentee", &requester.id))?;

        let mentors = self.db.list_mentors().await?;
        let ranked = ranking::suggest(&self.scorer(), &mentee, &mentors);

        log_debug!(
            "Ranked {} mentors for mentee {}",
            ranked.len(),
            requester.id
        );
        Ok(ranked)
    }

    /// Any authenticated requester may search.
    pub async fn search(
        &self,
        _requester: &Requester,
        criteria: &SearchCriteria,
    ) -> BookingResult<Vec<MentorSummary>> {
        let mentors = self.db.list_mentors().await?;
        Ok(ranking::search(criteria, &mentors))
    }

    pub async fn mentor(&self, mentor_id: &str) -> BookingResult<MentorSummary> {
        match self.db.get_user(mentor_id).await? {
            Some(user) if user.is_mentor() => Ok(MentorSummary::from(&user)),
            _ => Err(BookingError::not_found("mentor", mentor_id)),
        }
    }
}
