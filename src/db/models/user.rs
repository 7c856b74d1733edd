//! User and profile data models.
//!
//! Profiles are owned by the host application; this crate reads them to score
//! mentors and to surface availability templates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mentor,
    Mentee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Mentor => "mentor",
            Role::Mentee => "mentee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average: f64,
    pub count: u64,
}

/// Local clock times, `"HH:MM"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityTemplate {
    pub timezone: Option<String>,
    pub working_hours: Option<WorkingHours>,
    #[serde(default)]
    pub days_available: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub bio: Option<String>,
    pub industry: Option<String>,
    pub skills: Vec<String>,
    pub experience: Option<f64>,
    pub rating: Option<RatingSummary>,
    pub price_per_hour: Option<f64>,
    pub availability: Option<AvailabilityTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile: Option<Profile>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_mentor(&self) -> bool {
        self.role == Role::Mentor
    }
}

/// Public projection of a mentor. Carries no contact details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorSummary {
    pub id: String,
    pub name: String,
    pub profile: Option<Profile>,
}

impl From<&User> for MentorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            profile: user.profile.clone(),
        }
    }
}
