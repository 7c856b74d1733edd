use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};

use crate::db::{
    connection::Database,
    helpers::{from_epoch_ms, parse_datetime, parse_status, to_epoch_ms},
    models::{Booking, BookingStatus},
};
use crate::scheduling::{BookingFilter, TimeInterval};

const BOOKING_COLUMNS: &str = "id, mentor_id, mentee_id, start_ms, end_ms, status, notes, meeting_token, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOrder {
    Ascending,
    Descending,
}

impl StartOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            StartOrder::Ascending => "ASC",
            StartOrder::Descending => "DESC",
        }
    }
}

/// Result of the conditional insert.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted,
    Conflict(Booking),
}

fn row_to_booking(row: &Row) -> Result<Booking> {
    let start_ms: i64 = row.get("start_ms")?;
    let end_ms: i64 = row.get("end_ms")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Booking {
        id: row.get("id")?,
        mentor_id: row.get("mentor_id")?,
        mentee_id: row.get("mentee_id")?,
        interval: TimeInterval {
            start: from_epoch_ms(start_ms, "start_ms")?,
            end: from_epoch_ms(end_ms, "end_ms")?,
        },
        status: parse_status(&status)?,
        notes: row.get("notes")?,
        meeting_token: row.get("meeting_token")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

/// Translates a filter into a `WHERE` clause with positional parameters.
fn filter_clause(filter: &BookingFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(mentor_id) = &filter.mentor_id {
        conditions.push("mentor_id = ?".into());
        values.push(Box::new(mentor_id.clone()));
    }
    if let Some(mentee_id) = &filter.mentee_id {
        conditions.push("mentee_id = ?".into());
        values.push(Box::new(mentee_id.clone()));
    }
    if !filter.statuses.is_empty() {
        let placeholders = vec!["?"; filter.statuses.len()].join(", ");
        conditions.push(format!("status IN ({placeholders})"));
        for status in &filter.statuses {
            values.push(Box::new(status.as_str()));
        }
    }
    if let Some(interval) = &filter.overlapping {
        conditions.push("start_ms < ? AND end_ms > ?".into());
        values.push(Box::new(to_epoch_ms(interval.end)));
        values.push(Box::new(to_epoch_ms(interval.start)));
    }
    if let Some(from) = filter.starts_at_or_after {
        conditions.push("start_ms >= ?".into());
        values.push(Box::new(to_epoch_ms(from)));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (clause, values)
}

fn query_bookings(
    conn: &Connection,
    filter: &BookingFilter,
    order: StartOrder,
    limit: Option<usize>,
) -> Result<Vec<Booking>> {
    let (clause, values) = filter_clause(filter);
    let limit_clause = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
    let query = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {clause} ORDER BY start_ms {}, id ASC{limit_clause}",
        order.as_sql()
    );

    let params_refs: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&query)?;
    let mut rows = stmt.query(params_refs.as_slice())?;
    let mut bookings = Vec::new();
    while let Some(row) = rows.next()? {
        bookings.push(row_to_booking(row)?);
    }
    Ok(bookings)
}

fn insert_booking(conn: &Connection, booking: &Booking) -> Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, mentor_id, mentee_id, start_ms, end_ms, status, notes, meeting_token, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            booking.id,
            booking.mentor_id,
            booking.mentee_id,
            to_epoch_ms(booking.interval.start),
            to_epoch_ms(booking.interval.end),
            booking.status.as_str(),
            booking.notes,
            booking.meeting_token,
            booking.created_at.to_rfc3339(),
            booking.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl Database {
    pub async fn find_bookings(
        &self,
        filter: BookingFilter,
        order: StartOrder,
    ) -> Result<Vec<Booking>> {
        self.execute(move |conn| query_bookings(conn, &filter, order, None))
            .await
    }

    /// Any one booking for `mentor_id` in `statuses` that overlaps `interval`.
    pub async fn find_overlapping(
        &self,
        mentor_id: &str,
        interval: TimeInterval,
        statuses: &[BookingStatus],
    ) -> Result<Option<Booking>> {
        let filter = BookingFilter::for_mentor(mentor_id)
            .with_statuses(statuses)
            .overlapping(interval);
        self.execute(move |conn| {
            Ok(query_bookings(conn, &filter, StartOrder::Ascending, Some(1))?
                .into_iter()
                .next())
        })
        .await
    }

    pub async fn list_bookings_by_mentor(&self, mentor_id: &str) -> Result<Vec<Booking>> {
        self.find_bookings(BookingFilter::for_mentor(mentor_id), StartOrder::Descending)
            .await
    }

    pub async fn list_bookings_by_mentee(&self, mentee_id: &str) -> Result<Vec<Booking>> {
        self.find_bookings(BookingFilter::for_mentee(mentee_id), StartOrder::Descending)
            .await
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>> {
        let booking_id = booking_id.to_string();
        self.execute(move |conn| {
            let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
            let booking = conn
                .query_row(&query, params![booking_id], |row| Ok(row_to_booking(row)))
                .optional()?
                .transpose()?;
            Ok(booking)
        })
        .await
    }

    /// Inserts `booking` unless an active booking for the same mentor overlaps it.
    ///
    /// The overlap check and the insert share one IMMEDIATE transaction, so the
    /// write lock is held from the read onwards. Two racing inserts for the same
    /// mentor cannot both observe a free slot, whether they come through this
    /// handle or another connection to the same file.
    pub async fn insert_booking_if_free(&self, booking: &Booking) -> Result<InsertOutcome> {
        let record = booking.clone();
        self.execute(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let filter = BookingFilter::for_mentor(record.mentor_id.clone())
                .active()
                .overlapping(record.interval);
            if let Some(existing) = query_bookings(&tx, &filter, StartOrder::Ascending, Some(1))?
                .into_iter()
                .next()
            {
                tx.rollback()?;
                return Ok(InsertOutcome::Conflict(existing));
            }

            insert_booking(&tx, &record)?;
            tx.commit()?;
            Ok(InsertOutcome::Inserted)
        })
        .await
    }

    /// Moves a booking from `expected` to `next`. Returns false when the stored
    /// status no longer equals `expected` (or the booking is gone).
    pub async fn compare_and_set_status(
        &self,
        booking_id: &str,
        expected: BookingStatus,
        next: BookingStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let booking_id = booking_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE bookings
                 SET status = ?1,
                     updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![
                    next.as_str(),
                    updated_at.to_rfc3339(),
                    booking_id,
                    expected.as_str(),
                ],
            )?;
            Ok(rows_affected == 1)
        })
        .await
    }
}
