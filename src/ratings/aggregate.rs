use serde::{Deserialize, Serialize};

/// Running mean of a mentor's session ratings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingAggregate {
    pub average: f64,
    pub count: u64,
}

impl RatingAggregate {
    pub fn new(average: f64, count: u64) -> Self {
        Self { average, count }
    }

    /// `(average * count + score) / (count + 1)`; never rescans past ratings.
    pub fn incorporate(&self, score: u8) -> Self {
        let count = self.count + 1;
        let total = self.average * self.count as f64 + f64::from(score);
        Self {
            average: total / count as f64,
            count,
        }
    }
}
