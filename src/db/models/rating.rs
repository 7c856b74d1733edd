use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A mentee's rating of a completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub booking_id: String,
    pub mentor_id: String,
    pub mentee_id: String,
    pub score: u8,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}
