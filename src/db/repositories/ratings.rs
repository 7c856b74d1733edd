use anyhow::{anyhow, Result};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u64},
    models::Rating,
};
use crate::ratings::RatingAggregate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordOutcome {
    Recorded(RatingAggregate),
    AlreadyRated,
}

fn row_to_rating(row: &Row) -> Result<Rating> {
    let score: i64 = row.get("score")?;
    let created_at: String = row.get("created_at")?;

    Ok(Rating {
        id: row.get("id")?,
        booking_id: row.get("booking_id")?,
        mentor_id: row.get("mentor_id")?,
        mentee_id: row.get("mentee_id")?,
        score: u8::try_from(score).map_err(|_| anyhow!("score contains invalid value {score}"))?,
        feedback: row.get("feedback")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Stores a rating and folds it into the mentor's aggregate in one transaction.
    pub async fn record_rating(&self, rating: &Rating) -> Result<RecordOutcome> {
        let record = rating.clone();
        self.execute(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM ratings WHERE booking_id = ?1",
                    params![record.booking_id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                tx.rollback()?;
                return Ok(RecordOutcome::AlreadyRated);
            }

            tx.execute(
                "INSERT INTO ratings (id, booking_id, mentor_id, mentee_id, score, feedback, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.booking_id,
                    record.mentor_id,
                    record.mentee_id,
                    i64::from(record.score),
                    record.feedback,
                    record.created_at.to_rfc3339(),
                ],
            )?;

            let (average, count): (f64, i64) = tx
                .query_row(
                    "SELECT rating_average, rating_count FROM users WHERE id = ?1",
                    params![record.mentor_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
                .ok_or_else(|| anyhow!("mentor {} missing while recording rating", record.mentor_id))?;

            let updated = RatingAggregate::new(average, to_u64(count, "rating_count")?)
                .incorporate(record.score);

            tx.execute(
                "UPDATE users
                 SET rating_average = ?1,
                     rating_count = ?2
                 WHERE id = ?3",
                params![updated.average, to_i64(updated.count)?, record.mentor_id],
            )?;

            tx.commit()?;
            Ok(RecordOutcome::Recorded(updated))
        })
        .await
    }

    pub async fn list_ratings_for_mentor(&self, mentor_id: &str) -> Result<Vec<Rating>> {
        let mentor_id = mentor_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, booking_id, mentor_id, mentee_id, score, feedback, created_at
                 FROM ratings
                 WHERE mentor_id = ?1
                 ORDER BY rowid DESC",
            )?;

            let mut rows = stmt.query(params![mentor_id])?;
            let mut ratings = Vec::new();
            while let Some(row) = rows.next()? {
                ratings.push(row_to_rating(row)?);
            }
            Ok(ratings)
        })
        .await
    }
}
