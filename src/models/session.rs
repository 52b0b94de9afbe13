use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Day, FromSqliteRow, Participant};

/// A bookable time slot in a trainer's schedule.
///
/// The `id` is an explicit, client-chosen identifier (e.g. "Yoga-Monday-08:00")
/// stored alongside the structured `(trainer, day, start_time)` key. It is an
/// opaque string and is never parsed back into its parts.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub trainer_id: String,
    pub day: Day,
    pub start_time: String,
    pub class_type: String,
    pub participant_limit: i64,
}

impl FromSqliteRow for Session {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let day_str: String = row.get("day")?;
        let day = Day::parse(&day_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown day: {day_str}").into(),
            )
        })?;
        Ok(Self {
            id: row.get("id")?,
            trainer_id: row.get("trainer_id")?,
            day,
            start_time: row.get("start_time")?,
            class_type: row.get("class_type")?,
            participant_limit: row.get("participant_limit")?,
        })
    }
}

/// One slot of a rendered schedule, with its ordered participant list.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSlot {
    pub id: String,
    pub class_type: String,
    pub participant_limit: i64,
    pub participants: Vec<Participant>,
}

/// Full nested schedule for one trainer: day -> start_time -> slot.
#[derive(Debug, Serialize)]
pub struct TrainerSchedule {
    pub trainer: String,
    pub days: BTreeMap<Day, BTreeMap<String, ScheduleSlot>>,
}

/// A single session resolved by id or structured key, with owner context.
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub id: String,
    pub trainer: String,
    pub day: Day,
    pub start_time: String,
    pub class_type: String,
    pub participant_limit: i64,
    pub participants: Vec<Participant>,
}

/// Payload for one session when creating/replacing a schedule. The day comes
/// in as a string so malformed input maps to a 400 instead of a decode error.
#[derive(Debug, Deserialize)]
pub struct NewSession {
    pub id: String,
    pub day: String,
    pub start_time: String,
    pub class_type: String,
    pub participant_limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct PutSchedule {
    pub sessions: Vec<NewSession>,
}
