use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::FromSqliteRow;

/// Coarse booking lifecycle. Pending requests either get accepted (and move
/// to the accepted table) or expire in place; accepted bookings end in place
/// or move to history on refund. Terminal states are never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Accepted,
    Ended,
    Expired,
    Rejected,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Accepted => "Accepted",
            BookingStatus::Ended => "Ended",
            BookingStatus::Expired => "Expired",
            BookingStatus::Rejected => "Rejected",
            BookingStatus::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(BookingStatus::Pending),
            "Accepted" => Some(BookingStatus::Accepted),
            "Ended" => Some(BookingStatus::Ended),
            "Expired" => Some(BookingStatus::Expired),
            "Rejected" => Some(BookingStatus::Rejected),
            "Completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }
}

fn status_from_row(row: &Row) -> rusqlite::Result<BookingStatus> {
    let raw: String = row.get("status")?;
    BookingStatus::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown booking status: {raw}").into(),
        )
    })
}

fn session_ids_from_row(row: &Row) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get("session_ids")?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// A booking request awaiting acceptance. `booked_at` is RFC 3339.
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    pub id: String,
    pub trainer_name: String,
    pub session_ids: Vec<String>,
    pub booker_email: String,
    pub status: BookingStatus,
    pub booked_at: String,
}

impl FromSqliteRow for BookingRequest {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            trainer_name: row.get("trainer_name")?,
            session_ids: session_ids_from_row(row)?,
            booker_email: row.get("booker_email")?,
            status: status_from_row(row)?,
            booked_at: row.get("booked_at")?,
        })
    }
}

/// An accepted (paid) booking. `start_at` is `dd-mm-yyyy`; the ending sweep
/// flips status to Ended once `start_at + duration_weeks * 7 days` has passed.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedBooking {
    pub id: String,
    pub trainer_name: String,
    pub session_ids: Vec<String>,
    pub booker_email: String,
    pub payment_ref: String,
    pub status: BookingStatus,
    pub start_at: String,
    pub duration_weeks: i64,
    pub accepted_at: String,
}

impl FromSqliteRow for AcceptedBooking {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            trainer_name: row.get("trainer_name")?,
            session_ids: session_ids_from_row(row)?,
            booker_email: row.get("booker_email")?,
            payment_ref: row.get("payment_ref")?,
            status: status_from_row(row)?,
            start_at: row.get("start_at")?,
            duration_weeks: row.get("duration_weeks")?,
            accepted_at: row.get("accepted_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedBooking {
    pub id: String,
    pub trainer_name: String,
    pub booker_email: String,
    pub reason: String,
    pub rejected_at: String,
}

impl FromSqliteRow for RejectedBooking {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            trainer_name: row.get("trainer_name")?,
            booker_email: row.get("booker_email")?,
            reason: row.get("reason")?,
            rejected_at: row.get("rejected_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingHistoryEntry {
    pub id: String,
    pub trainer_name: String,
    pub booker_email: String,
    pub payment_ref: String,
    pub outcome: String,
    pub recorded_at: String,
}

impl FromSqliteRow for BookingHistoryEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            trainer_name: row.get("trainer_name")?,
            booker_email: row.get("booker_email")?,
            payment_ref: row.get("payment_ref")?,
            outcome: row.get("outcome")?,
            recorded_at: row.get("recorded_at")?,
        })
    }
}

/// One-off class reservation swept into the completed table once its
/// `class_date` (`dd-mm-yyyy`) has passed.
#[derive(Debug, Clone, Serialize)]
pub struct ClassBooking {
    pub id: String,
    pub class_name: String,
    pub booker_email: String,
    pub class_date: String,
}

impl FromSqliteRow for ClassBooking {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            class_name: row.get("class_name")?,
            booker_email: row.get("booker_email")?,
            class_date: row.get("class_date")?,
        })
    }
}

// Request payloads

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub trainer: String,
    pub session_ids: Vec<String>,
    pub booker_email: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateBooking {
    pub trainer: String,
    pub sessions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptBooking {
    pub session_ids: Vec<String>,
    pub booker_email: String,
    pub payment_ref: String,
    pub accepted_at: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectBooking {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClassBooking {
    pub class_name: String,
    pub booker_email: String,
    pub class_date: String,
}

/// Validation verdict. `reason` is set exactly when `valid` is false.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: String) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}
