use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_role, to_i64, to_u64},
    models::{Profile, RatingSummary, Role, User},
};

const USER_COLUMNS: &str =
    "id, name, email, role, profile, rating_average, rating_count, created_at";

fn row_to_user(row: &Row) -> Result<User> {
    let role: String = row.get("role")?;
    let profile_json: Option<String> = row.get("profile")?;
    let rating_average: f64 = row.get("rating_average")?;
    let rating_count: i64 = row.get("rating_count")?;
    let created_at: String = row.get("created_at")?;

    let mut profile = profile_json
        .map(|raw| serde_json::from_str::<Profile>(&raw))
        .transpose()
        .context("failed to parse stored profile")?;

    // The rating columns are authoritative; the JSON copy is never read back.
    // A rated user without a stored profile still exposes the aggregate.
    if rating_count > 0 || rating_average > 0.0 {
        profile.get_or_insert_with(Profile::default).rating = Some(RatingSummary {
            average: rating_average,
            count: to_u64(rating_count, "rating_count")?,
        });
    } else if let Some(profile) = profile.as_mut() {
        profile.rating = None;
    }

    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role: parse_role(&role)?,
        profile,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Inserts or updates a user record. Profile data is owned by the host
    /// application; this is how it hands profiles to the booking core.
    ///
    /// `profile.rating` seeds the aggregate on first insert only. Afterwards the
    /// aggregate belongs to the rating ledger and updates leave it untouched.
    pub async fn upsert_user(&self, user: &User) -> Result<()> {
        let record = user.clone();
        self.execute(move |conn| {
            let rating = record
                .profile
                .as_ref()
                .and_then(|p| p.rating)
                .unwrap_or_default();
            let profile_json = record
                .profile
                .as_ref()
                .map(|profile| {
                    let mut stored = profile.clone();
                    stored.rating = None;
                    serde_json::to_string(&stored)
                })
                .transpose()?;

            conn.execute(
                "INSERT INTO users (id, name, email, role, profile, rating_average, rating_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     email = excluded.email,
                     role = excluded.role,
                     profile = excluded.profile",
                params![
                    record.id,
                    record.name,
                    record.email,
                    record.role.as_str(),
                    profile_json,
                    rating.average,
                    to_i64(rating.count)?,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to upsert user {}", record.id))?;
            Ok(())
        })
        .await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            let user = conn
                .query_row(&query, params![user_id], |row| Ok(row_to_user(row)))
                .optional()?
                .transpose()?;
            Ok(user)
        })
        .await
    }

    /// All mentors in insertion order. Ranking relies on this order for ties.
    pub async fn list_mentors(&self) -> Result<Vec<User>> {
        self.execute(|conn| {
            let query = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY rowid ASC"
            );
            let mut stmt = conn.prepare(&query)?;
            let mut rows = stmt.query(params![Role::Mentor.as_str()])?;
            let mut mentors = Vec::new();
            while let Some(row) = rows.next()? {
                mentors.push(row_to_user(row)?);
            }
            Ok(mentors)
        })
        .await
    }
}
