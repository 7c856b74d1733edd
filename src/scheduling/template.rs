//! Evaluation of a mentor's advisory working-hours template.
//!
//! Only fixed UTC offsets are understood (`UTC`, `GMT`, `Z`, `+02:00`,
//! `UTC-05:30`). Named zones such as `Europe/Berlin` cannot be evaluated and
//! leave candidate slots unannotated.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};

use crate::db::models::AvailabilityTemplate;

use super::TimeInterval;

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateWindow {
    offset: FixedOffset,
    hours: Option<(NaiveTime, NaiveTime)>,
    days: Vec<Weekday>,
}

impl TemplateWindow {
    /// Returns None when the template has nothing to evaluate or cannot be parsed.
    pub fn from_template(template: &AvailabilityTemplate) -> Option<Self> {
        let offset = parse_offset(template.timezone.as_deref().unwrap_or("UTC"))?;

        let hours = match &template.working_hours {
            Some(wh) => Some((parse_clock(&wh.start)?, parse_clock(&wh.end)?)),
            None => None,
        };

        let days = template
            .days_available
            .iter()
            .map(|d| d.trim().parse::<Weekday>().ok())
            .collect::<Option<Vec<_>>>()?;

        if hours.is_none() && days.is_empty() {
            return None;
        }

        Some(Self {
            offset,
            hours,
            days,
        })
    }

    pub fn contains(&self, interval: &TimeInterval) -> bool {
        let start = self.local(interval.start);
        let end = self.local(interval.end);

        if !self.days.is_empty() && !self.days.contains(&start.weekday()) {
            return false;
        }

        match self.hours {
            Some((open, close)) => {
                start.date_naive() == end.date_naive()
                    && start.time() >= open
                    && end.time() <= close
            }
            None => true,
        }
    }

    fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }
}

fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

fn parse_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    let rest = value
        .strip_prefix("UTC")
        .or_else(|| value.strip_prefix("GMT"))
        .unwrap_or(value);

    if rest.is_empty() || rest == "Z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, digits) = match rest.as_bytes().first()? {
        b'+' => (1, &rest[1..]),
        b'-' => (-1, &rest[1..]),
        _ => return None,
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (digits.parse::<i32>().ok()?, 0),
    };
    if hours > 14 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
