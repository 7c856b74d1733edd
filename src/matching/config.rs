use serde::{Deserialize, Serialize};

/// Point weights for the built-in match factors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringWeights {
    /// Awarded in full when industries match.
    pub industry: f64,
    /// Scaled by the share of the mentee's skills the mentor also has.
    pub skills: f64,
    /// Scaled by experience up to `experience_cap_years`.
    pub experience: f64,
    pub experience_cap_years: f64,
    /// Scaled by `average / rating_scale`.
    pub rating: f64,
    pub rating_scale: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            industry: 30.0,
            skills: 40.0,
            experience: 20.0,
            experience_cap_years: 10.0,
            rating: 10.0,
            rating_scale: 5.0,
        }
    }
}
