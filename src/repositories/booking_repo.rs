use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::models::{
    AcceptedBooking, BookingHistoryEntry, BookingRequest, BookingStatus, ClassBooking,
    FromSqliteRow, RejectedBooking,
};

/// Booking records across their lifecycle tables. Each record is owned by
/// exactly one table at a time; a state that lives in a different table is
/// reached by copy+delete, never by reference.
#[derive(Clone)]
pub struct BookingRepository {
    pool: DbPool,
}

fn list_all<T: FromSqliteRow>(conn: &Connection, sql: &str) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], T::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

impl BookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_request(
        &self,
        trainer_name: &str,
        session_ids: Vec<String>,
        booker_email: &str,
    ) -> Result<BookingRequest> {
        let pool = self.pool.clone();
        let trainer_name = trainer_name.to_string();
        let booker_email = booker_email.to_string();
        tokio::task::spawn_blocking(move || {
            if session_ids.is_empty() {
                return Err(AppError::BadRequest(
                    "a booking needs at least one session".to_string(),
                ));
            }
            let request = BookingRequest {
                id: Uuid::new_v4().to_string(),
                trainer_name,
                session_ids,
                booker_email,
                status: BookingStatus::Pending,
                booked_at: Utc::now().to_rfc3339(),
            };
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO booking_requests
                     (id, trainer_name, session_ids, booker_email, status, booked_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    request.id,
                    request.trainer_name,
                    serde_json::to_string(&request.session_ids)
                        .map_err(|e| AppError::Internal(e.to_string()))?,
                    request.booker_email,
                    request.status.as_str(),
                    request.booked_at
                ],
            )?;
            Ok(request)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    pub async fn find_request(&self, id: &str) -> Result<Option<BookingRequest>> {
        let pool = self.pool.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare("SELECT * FROM booking_requests WHERE id = ?")?;
            let request = stmt.query_row([&id], BookingRequest::from_row).optional()?;
            Ok(request)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    pub async fn list_requests(&self) -> Result<Vec<BookingRequest>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            list_all(&conn, "SELECT * FROM booking_requests ORDER BY booked_at DESC")
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    pub async fn list_accepted(&self) -> Result<Vec<AcceptedBooking>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            list_all(
                &conn,
                "SELECT * FROM accepted_bookings ORDER BY accepted_at DESC",
            )
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    pub async fn list_rejected(&self) -> Result<Vec<RejectedBooking>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            list_all(
                &conn,
                "SELECT * FROM rejected_bookings ORDER BY rejected_at DESC",
            )
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    pub async fn list_history(&self) -> Result<Vec<BookingHistoryEntry>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            list_all(
                &conn,
                "SELECT * FROM booking_history ORDER BY recorded_at DESC",
            )
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Reject a pending request: copy into the rejected table, delete the
    /// request.
    pub async fn reject_request(&self, id: &str, reason: &str) -> Result<RejectedBooking> {
        let pool = self.pool.clone();
        let id = id.to_string();
        let reason = reason.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let tx = conn.transaction()?;

            let mut stmt = tx.prepare("SELECT * FROM booking_requests WHERE id = ?")?;
            let request = stmt
                .query_row([&id], BookingRequest::from_row)
                .optional()?
                .ok_or_else(|| AppError::NotFound(format!("booking request not found: {id}")))?;
            drop(stmt);

            let rejected = RejectedBooking {
                id: Uuid::new_v4().to_string(),
                trainer_name: request.trainer_name,
                booker_email: request.booker_email,
                reason,
                rejected_at: Utc::now().to_rfc3339(),
            };
            tx.execute(
                "INSERT INTO rejected_bookings
                     (id, trainer_name, booker_email, reason, rejected_at)
                 VALUES (?, ?, ?, ?, ?)",
                rusqlite::params![
                    rejected.id,
                    rejected.trainer_name,
                    rejected.booker_email,
                    rejected.reason,
                    rejected.rejected_at
                ],
            )?;
            tx.execute("DELETE FROM booking_requests WHERE id = ?", [&id])?;
            tx.commit()?;
            Ok(rejected)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Promote the booker's pending request for this trainer into the
    /// accepted table (copy+delete). A missing request is not an error: the
    /// schedule itself is the source of truth for acceptance.
    #[allow(clippy::too_many_arguments)]
    pub async fn promote_request(
        &self,
        trainer_name: &str,
        booker_email: &str,
        session_ids: Vec<String>,
        payment_ref: &str,
        accepted_at: &str,
        start_at: &str,
        duration_weeks: i64,
    ) -> Result<AcceptedBooking> {
        let pool = self.pool.clone();
        let trainer_name = trainer_name.to_string();
        let booker_email = booker_email.to_string();
        let payment_ref = payment_ref.to_string();
        let accepted_at = accepted_at.to_string();
        let start_at = start_at.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let tx = conn.transaction()?;

            let request_id: Option<String> = tx
                .query_row(
                    "SELECT id FROM booking_requests
                     WHERE trainer_name = ? AND booker_email = ? AND status = 'Pending'
                     ORDER BY booked_at LIMIT 1",
                    rusqlite::params![trainer_name, booker_email],
                    |row| row.get(0),
                )
                .optional()?;

            let accepted = AcceptedBooking {
                id: Uuid::new_v4().to_string(),
                trainer_name,
                session_ids,
                booker_email,
                payment_ref,
                status: BookingStatus::Accepted,
                start_at,
                duration_weeks,
                accepted_at,
            };
            tx.execute(
                "INSERT INTO accepted_bookings
                     (id, trainer_name, session_ids, booker_email, payment_ref,
                      status, start_at, duration_weeks, accepted_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    accepted.id,
                    accepted.trainer_name,
                    serde_json::to_string(&accepted.session_ids)
                        .map_err(|e| AppError::Internal(e.to_string()))?,
                    accepted.booker_email,
                    accepted.payment_ref,
                    accepted.status.as_str(),
                    accepted.start_at,
                    accepted.duration_weeks,
                    accepted.accepted_at
                ],
            )?;
            if let Some(request_id) = request_id {
                tx.execute("DELETE FROM booking_requests WHERE id = ?", [&request_id])?;
            }
            tx.commit()?;
            Ok(accepted)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Refund an accepted booking: copy into history with outcome `Refunded`,
    /// delete the accepted row.
    pub async fn refund_accepted(&self, id: &str) -> Result<BookingHistoryEntry> {
        let pool = self.pool.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let tx = conn.transaction()?;

            let mut stmt = tx.prepare("SELECT * FROM accepted_bookings WHERE id = ?")?;
            let accepted = stmt
                .query_row([&id], AcceptedBooking::from_row)
                .optional()?
                .ok_or_else(|| AppError::NotFound(format!("accepted booking not found: {id}")))?;
            drop(stmt);

            let entry = BookingHistoryEntry {
                id: Uuid::new_v4().to_string(),
                trainer_name: accepted.trainer_name,
                booker_email: accepted.booker_email,
                payment_ref: accepted.payment_ref,
                outcome: "Refunded".to_string(),
                recorded_at: Utc::now().to_rfc3339(),
            };
            tx.execute(
                "INSERT INTO booking_history
                     (id, trainer_name, booker_email, payment_ref, outcome, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    entry.id,
                    entry.trainer_name,
                    entry.booker_email,
                    entry.payment_ref,
                    entry.outcome,
                    entry.recorded_at
                ],
            )?;
            tx.execute("DELETE FROM accepted_bookings WHERE id = ?", [&id])?;
            tx.commit()?;
            Ok(entry)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    pub async fn create_class_booking(
        &self,
        class_name: &str,
        booker_email: &str,
        class_date: &str,
    ) -> Result<ClassBooking> {
        let pool = self.pool.clone();
        let booking = ClassBooking {
            id: Uuid::new_v4().to_string(),
            class_name: class_name.to_string(),
            booker_email: booker_email.to_string(),
            class_date: class_date.to_string(),
        };
        let record = booking.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO class_bookings (id, class_name, booker_email, class_date)
                 VALUES (?, ?, ?, ?)",
                rusqlite::params![
                    record.id,
                    record.class_name,
                    record.booker_email,
                    record.class_date
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
        Ok(booking)
    }

    pub async fn list_class_bookings(&self) -> Result<Vec<ClassBooking>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            list_all(&conn, "SELECT * FROM class_bookings ORDER BY class_date")
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }
}
