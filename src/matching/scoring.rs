//! Mentee/mentor compatibility scoring.
//!
//! A score is the sum of independent factors. Each factor sees both profiles and
//! returns its points plus an optional human-readable explanation. With the
//! default weights the total lands in 0..=100.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::models::{Profile, User};

use super::ScoringWeights;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    pub value: f64,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorScore {
    pub points: f64,
    pub explanation: Option<String>,
}

impl FactorScore {
    fn explained(points: f64, explanation: String) -> Self {
        Self {
            points,
            explanation: Some(explanation),
        }
    }
}

/// One term of the match score. Returning None means the factor does not apply
/// (missing data) and contributes nothing.
pub trait ScoringFactor: Send + Sync {
    fn evaluate(&self, mentee: &Profile, mentor: &Profile) -> Option<FactorScore>;
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn lowercase_set(values: &[String]) -> HashSet<String> {
    values.iter().map(|s| s.to_lowercase()).collect()
}

pub struct IndustryFactor {
    pub weight: f64,
}

impl ScoringFactor for IndustryFactor {
    fn evaluate(&self, mentee: &Profile, mentor: &Profile) -> Option<FactorScore> {
        let mentee_industry = non_empty(&mentee.industry)?;
        let mentor_industry = non_empty(&mentor.industry)?;
        (mentee_industry.to_lowercase() == mentor_industry.to_lowercase())
            .then(|| FactorScore::explained(self.weight, "Industry match".to_string()))
    }
}

pub struct SkillsFactor {
    pub weight: f64,
}

impl ScoringFactor for SkillsFactor {
    fn evaluate(&self, mentee: &Profile, mentor: &Profile) -> Option<FactorScore> {
        let wanted = lowercase_set(&mentee.skills);
        let offered = lowercase_set(&mentor.skills);
        let common = wanted.intersection(&offered).count();
        let ratio = common as f64 / wanted.len().max(1) as f64;

        Some(FactorScore {
            points: self.weight * ratio,
            explanation: (common > 0).then(|| format!("{common} common skills")),
        })
    }
}

pub struct ExperienceFactor {
    pub weight: f64,
    pub cap_years: f64,
}

impl ScoringFactor for ExperienceFactor {
    fn evaluate(&self, _mentee: &Profile, mentor: &Profile) -> Option<FactorScore> {
        let years = mentor.experience.filter(|y| y.is_finite() && *y > 0.0)?;
        let share = if self.cap_years > 0.0 {
            (years / self.cap_years).min(1.0)
        } else {
            1.0
        };
        Some(FactorScore::explained(
            share * self.weight,
            format!("{years} years experience"),
        ))
    }
}

pub struct RatingFactor {
    pub weight: f64,
    pub scale: f64,
}

impl ScoringFactor for RatingFactor {
    fn evaluate(&self, _mentee: &Profile, mentor: &Profile) -> Option<FactorScore> {
        let average = mentor
            .rating
            .map(|r| r.average)
            .filter(|a| a.is_finite() && *a > 0.0)?;
        let scale = if self.scale > 0.0 { self.scale } else { 5.0 };
        Some(FactorScore::explained(
            average / scale * self.weight,
            format!("Rating: {average:.1}"),
        ))
    }
}

/// Ordered list of factors. Factor explanations appear in evaluation order.
#[derive(Clone)]
pub struct MatchScorer {
    factors: Vec<Arc<dyn ScoringFactor>>,
}

impl MatchScorer {
    pub fn new(weights: &ScoringWeights) -> Self {
        Self {
            factors: vec![
                Arc::new(IndustryFactor {
                    weight: weights.industry,
                }),
                Arc::new(SkillsFactor {
                    weight: weights.skills,
                }),
                Arc::new(ExperienceFactor {
                    weight: weights.experience,
                    cap_years: weights.experience_cap_years,
                }),
                Arc::new(RatingFactor {
                    weight: weights.rating,
                    scale: weights.rating_scale,
                }),
            ],
        }
    }

    /// Appends a factor after the built-in ones.
    pub fn with_factor(self, factor: impl ScoringFactor + 'static) -> Self {
        self.with_shared_factor(Arc::new(factor))
    }

    pub fn with_shared_factor(mut self, factor: Arc<dyn ScoringFactor>) -> Self {
        self.factors.push(factor);
        self
    }

    pub fn score_profiles(&self, mentee: &Profile, mentor: &Profile) -> MatchScore {
        let mut value = 0.0;
        let mut factors = Vec::new();
        for factor in &self.factors {
            if let Some(result) = factor.evaluate(mentee, mentor) {
                value += result.points;
                factors.extend(result.explanation);
            }
        }
        MatchScore { value, factors }
    }

    /// Users without a profile are scored as if their profile were empty.
    pub fn score(&self, mentee: &User, mentor: &User) -> MatchScore {
        let empty = Profile::default();
        self.score_profiles(
            mentee.profile.as_ref().unwrap_or(&empty),
            mentor.profile.as_ref().unwrap_or(&empty),
        )
    }
}

impl Default for MatchScorer {
    fn default() -> Self {
        Self::new(&ScoringWeights::default())
    }
}

/// Scores with the default weights.
pub fn score(mentee: &User, mentor: &User) -> MatchScore {
    MatchScorer::default().score(mentee, mentor)
}
