use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::FromSqliteRow;

/// One reservation inside a session. `booker_email` is unique per session;
/// the paid flag, payment reference and acceptance timestamp are stamped by
/// the booking acceptance workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub session_id: String,
    pub booker_email: String,
    pub payment_ref: Option<String>,
    pub start_date: String,
    pub duration_weeks: i64,
    pub paid: bool,
    pub accepted_at: Option<String>,
}

impl FromSqliteRow for Participant {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            booker_email: row.get("booker_email")?,
            payment_ref: row.get("payment_ref")?,
            start_date: row.get("start_date")?,
            duration_weeks: row.get("duration_weeks")?,
            paid: row.get("paid")?,
            accepted_at: row.get("accepted_at")?,
        })
    }
}

/// Reservation payload for the add-participant operation. `start_date` is
/// `dd-mm-yyyy`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddParticipants {
    pub session_ids: Vec<String>,
    pub booker_email: String,
    pub start_date: String,
    pub duration_weeks: i64,
}
