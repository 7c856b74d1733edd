use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::db::models::{MentorSummary, Profile, User};

use super::{MatchScore, MatchScorer};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMentor {
    pub mentor: MentorSummary,
    pub score: f64,
    pub factors: Vec<String>,
}

/// Hard filters for mentor search. Unset fields do not filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchCriteria {
    /// Case-insensitive substring of the mentor's industry.
    pub industry: Option<String>,
    /// Mentor must share at least one of these (case-insensitive).
    pub skills: Vec<String>,
    /// Numeric thresholds of zero or less do not filter.
    pub min_experience: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    /// Case-insensitive substring of the mentor's name or bio.
    pub text: Option<String>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn positive(threshold: Option<f64>) -> Option<f64> {
    threshold.filter(|t| *t > 0.0)
}

fn rating_average(profile: Option<&Profile>) -> f64 {
    profile
        .and_then(|p| p.rating)
        .map(|r| r.average)
        .unwrap_or(0.0)
}

impl SearchCriteria {
    pub fn matches(&self, mentor: &User) -> bool {
        let empty = Profile::default();
        let profile = mentor.profile.as_ref().unwrap_or(&empty);

        if let Some(industry) = self.industry.as_deref().filter(|s| !s.is_empty()) {
            match profile.industry.as_deref() {
                Some(actual) if contains_ci(actual, industry) => {}
                _ => return false,
            }
        }

        if !self.skills.is_empty() {
            let wanted: HashSet<String> = self.skills.iter().map(|s| s.to_lowercase()).collect();
            if !profile
                .skills
                .iter()
                .any(|s| wanted.contains(&s.to_lowercase()))
            {
                return false;
            }
        }

        if let Some(min) = positive(self.min_experience) {
            match profile.experience {
                Some(years) if years >= min => {}
                _ => return false,
            }
        }

        if let Some(max) = positive(self.max_price) {
            match profile.price_per_hour {
                Some(price) if price <= max => {}
                _ => return false,
            }
        }

        if let Some(min) = positive(self.min_rating) {
            if rating_average(Some(profile)) < min {
                return false;
            }
        }

        if let Some(text) = self.text.as_deref().filter(|s| !s.is_empty()) {
            let in_bio = profile.bio.as_deref().is_some_and(|bio| contains_ci(bio, text));
            if !contains_ci(&mentor.name, text) && !in_bio {
                return false;
            }
        }

        true
    }
}

/// Scores every mentor against `mentee`, best first. Equal scores keep their
/// input order.
pub fn suggest(scorer: &MatchScorer, mentee: &User, mentors: &[User]) -> Vec<RankedMentor> {
    let mut ranked: Vec<RankedMentor> = mentors
        .iter()
        .filter(|m| m.is_mentor())
        .map(|mentor| {
            let MatchScore { value, factors } = scorer.score(mentee, mentor);
            RankedMentor {
                mentor: MentorSummary::from(mentor),
                score: value,
                factors,
            }
        })
        .collect();

    // sort_by is stable.
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Filters mentors, then orders them by rating average, highest first.
/// Equal ratings keep their input order.
pub fn search(criteria: &SearchCriteria, mentors: &[User]) -> Vec<MentorSummary> {
    let mut matched: Vec<&User> = mentors
        .iter()
        .filter(|m| m.is_mentor() && criteria.matches(m))
        .collect();

    matched.sort_by(|a, b| {
        rating_average(b.profile.as_ref())
            .partial_cmp(&rating_average(a.profile.as_ref()))
            .unwrap_or(Ordering::Equal)
    });
    matched.into_iter().map(MentorSummary::from).collect()
}
