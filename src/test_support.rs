//! Fixtures shared by the database-backed unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
    db::{
        models::{Profile, Role, User},
        Database,
    },
    requester::Requester,
    scheduling::TimeInterval,
};

/// 2030-03-11 is a Monday.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 11, hour, minute, 0).unwrap()
}

pub fn slot(start: (u32, u32), end: (u32, u32)) -> TimeInterval {
    TimeInterval::new(at(start.0, start.1), at(end.0, end.1)).unwrap()
}

pub fn hours(start_hour: u32, length: i64) -> TimeInterval {
    TimeInterval::starting_at(at(start_hour, 0), Duration::hours(length)).unwrap()
}

pub fn user(id: &str, role: Role, profile: Option<Profile>) -> User {
    User {
        id: id.to_string(),
        name: format!("User {id}"),
        email: format!("{id}@example.com"),
        role,
        profile,
        created_at: Utc::now(),
    }
}

pub async fn add_user(db: &Database, id: &str, role: Role, profile: Option<Profile>) -> Requester {
    db.upsert_user(&user(id, role, profile)).await.unwrap();
    Requester {
        id: id.to_string(),
        role,
    }
}

/// In-memory database with mentors `mentor-1`, `mentor-2` and mentees `mentee-1`, `mentee-2`.
pub async fn seeded_db() -> Database {
    let db = Database::in_memory().unwrap();
    seed(&db).await;
    db
}

pub async fn seed(db: &Database) {
    for id in ["mentor-1", "mentor-2"] {
        add_user(db, id, Role::Mentor, Some(Profile::default())).await;
    }
    for id in ["mentee-1", "mentee-2"] {
        add_user(db, id, Role::Mentee, None).await;
    }
}
