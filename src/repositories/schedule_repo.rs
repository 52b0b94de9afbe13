use chrono::{NaiveTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::dates::{self, DateFormat};
use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::models::{
    AcceptBooking, AddParticipants, Day, FromSqliteRow, NewSession, Participant, ScheduleSlot,
    Session, SessionDetail, TrainerSchedule, Validation,
};

/// A session the acceptance workflow could not update, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedSession {
    pub session_id: String,
    pub reason: String,
}

/// Result of the booking acceptance workflow. `start_date` and
/// `duration_weeks` are taken from the first participant entry that was
/// stamped, so the caller can mirror the booking into the accepted table.
#[derive(Debug, Serialize)]
pub struct AcceptanceOutcome {
    pub updated: Vec<String>,
    pub skipped: Vec<SkippedSession>,
    pub trainer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_weeks: Option<i64>,
}

#[derive(Clone)]
pub struct ScheduleRepository {
    pool: DbPool,
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn trainer_id_by_name(conn: &Connection, name: &str) -> Result<Option<String>> {
    let id = conn
        .query_row("SELECT id FROM trainers WHERE name = ?", [name], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(id)
}

fn session_participants(conn: &Connection, session_id: &str) -> Result<Vec<Participant>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM participants WHERE session_id = ? ORDER BY created_at, id",
    )?;
    let participants = stmt
        .query_map([session_id], Participant::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(participants)
}

fn render_schedule(conn: &Connection, trainer_id: &str, trainer_name: &str) -> Result<TrainerSchedule> {
    let mut stmt = conn.prepare(
        "SELECT * FROM sessions WHERE trainer_id = ? ORDER BY day, start_time",
    )?;
    let sessions = stmt
        .query_map([trainer_id], Session::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut days: BTreeMap<Day, BTreeMap<String, ScheduleSlot>> = BTreeMap::new();
    for session in sessions {
        let participants = session_participants(conn, &session.id)?;
        days.entry(session.day).or_default().insert(
            session.start_time,
            ScheduleSlot {
                id: session.id,
                class_type: session.class_type,
                participant_limit: session.participant_limit,
                participants,
            },
        );
    }

    Ok(TrainerSchedule {
        trainer: trainer_name.to_string(),
        days,
    })
}

fn session_detail(conn: &Connection, session: Session, trainer_name: String) -> Result<SessionDetail> {
    let participants = session_participants(conn, &session.id)?;
    Ok(SessionDetail {
        id: session.id,
        trainer: trainer_name,
        day: session.day,
        start_time: session.start_time,
        class_type: session.class_type,
        participant_limit: session.participant_limit,
        participants,
    })
}

impl ScheduleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_schedule(&self, trainer_name: &str) -> Result<Option<TrainerSchedule>> {
        let pool = self.pool.clone();
        let trainer_name = trainer_name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            match trainer_id_by_name(&conn, &trainer_name)? {
                Some(trainer_id) => Ok(Some(render_schedule(&conn, &trainer_id, &trainer_name)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Create or replace the trainer's whole schedule. Existing sessions and
    /// their participants are dropped first; the replacement is all-or-nothing.
    pub async fn put_schedule(
        &self,
        trainer_name: &str,
        sessions: Vec<NewSession>,
    ) -> Result<TrainerSchedule> {
        let pool = self.pool.clone();
        let trainer_name = trainer_name.to_string();
        tokio::task::spawn_blocking(move || {
            for session in &sessions {
                if Day::parse(&session.day).is_none() {
                    return Err(AppError::BadRequest(format!(
                        "unknown day: {}",
                        session.day
                    )));
                }
                if NaiveTime::parse_from_str(&session.start_time, "%H:%M").is_err() {
                    return Err(AppError::BadRequest(format!(
                        "invalid start time: {}",
                        session.start_time
                    )));
                }
                if session.participant_limit < 1 {
                    return Err(AppError::BadRequest(format!(
                        "participant limit must be at least 1 for session id: {}",
                        session.id
                    )));
                }
            }

            let mut conn = pool.get()?;
            let tx = conn.transaction()?;

            let trainer_id = match trainer_id_by_name(&tx, &trainer_name)? {
                Some(id) => id,
                None => {
                    let id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO trainers (id, name, created_at) VALUES (?, ?, ?)",
                        rusqlite::params![id, trainer_name, Utc::now()],
                    )?;
                    id
                }
            };

            tx.execute(
                "DELETE FROM participants WHERE session_id IN
                 (SELECT id FROM sessions WHERE trainer_id = ?)",
                [&trainer_id],
            )?;
            tx.execute("DELETE FROM sessions WHERE trainer_id = ?", [&trainer_id])?;

            for session in &sessions {
                tx.execute(
                    "INSERT INTO sessions (id, trainer_id, day, start_time, class_type, participant_limit)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    rusqlite::params![
                        session.id,
                        trainer_id,
                        session.day,
                        session.start_time,
                        session.class_type,
                        session.participant_limit
                    ],
                )
                .map_err(|e| {
                    if is_constraint_violation(&e) {
                        AppError::Conflict(format!("duplicate session: {}", session.id))
                    } else {
                        AppError::Database(e)
                    }
                })?;
            }

            let schedule = render_schedule(&tx, &trainer_id, &trainer_name)?;
            tx.commit()?;
            Ok(schedule)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Exact-match lookup by the structured key (trainer, day, time).
    pub async fn find_session(
        &self,
        trainer_name: &str,
        day: Day,
        start_time: &str,
    ) -> Result<Option<SessionDetail>> {
        let pool = self.pool.clone();
        let trainer_name = trainer_name.to_string();
        let start_time = start_time.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let trainer_id = match trainer_id_by_name(&conn, &trainer_name)? {
                Some(id) => id,
                None => return Ok(None),
            };
            let mut stmt = conn.prepare(
                "SELECT * FROM sessions WHERE trainer_id = ? AND day = ? AND start_time = ?",
            )?;
            let session = stmt
                .query_row(
                    rusqlite::params![trainer_id, day.as_str(), start_time],
                    Session::from_row,
                )
                .optional()?;
            match session {
                Some(session) => Ok(Some(session_detail(&conn, session, trainer_name)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Global lookup by the explicit session id. The id is opaque; it is
    /// never split back into trainer/day/time parts.
    pub async fn find_session_by_id(&self, id: &str) -> Result<Option<SessionDetail>> {
        let pool = self.pool.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let row = conn
                .query_row(
                    "SELECT s.*, t.name AS trainer_name
                     FROM sessions s JOIN trainers t ON s.trainer_id = t.id
                     WHERE s.id = ?",
                    [&id],
                    |row| {
                        let session = Session::from_row(row)?;
                        let trainer_name: String = row.get("trainer_name")?;
                        Ok((session, trainer_name))
                    },
                )
                .optional()?;
            match row {
                Some((session, trainer_name)) => {
                    Ok(Some(session_detail(&conn, session, trainer_name)?))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Reserve a spot in every requested session, atomically.
    ///
    /// Each insert is conditional on the live occupancy staying below the
    /// session's limit, and all requested sessions commit in one transaction:
    /// if any is unknown, full, or already holds this booker's email, nothing
    /// is written.
    pub async fn add_participant(
        &self,
        trainer_name: &str,
        req: AddParticipants,
    ) -> Result<Vec<Participant>> {
        let pool = self.pool.clone();
        let trainer_name = trainer_name.to_string();
        tokio::task::spawn_blocking(move || {
            if req.booker_email.trim().is_empty() {
                return Err(AppError::BadRequest("booker email is required".to_string()));
            }
            if dates::parse_utc(DateFormat::DayMonthYear, &req.start_date).is_err() {
                return Err(AppError::BadRequest(format!(
                    "invalid start date: {} (expected dd-mm-yyyy)",
                    req.start_date
                )));
            }
            if req.duration_weeks < 1 {
                return Err(AppError::BadRequest(
                    "duration must be at least 1 week".to_string(),
                ));
            }

            let mut conn = pool.get()?;
            let tx = conn.transaction()?;

            let trainer_id = trainer_id_by_name(&tx, &trainer_name)?
                .ok_or_else(|| AppError::NotFound(format!("trainer not found: {trainer_name}")))?;

            let now = Utc::now();
            let mut added = Vec::with_capacity(req.session_ids.len());
            for session_id in &req.session_ids {
                let known: bool = tx.query_row(
                    "SELECT COUNT(*) > 0 FROM sessions WHERE id = ? AND trainer_id = ?",
                    rusqlite::params![session_id, trainer_id],
                    |row| row.get(0),
                )?;
                if !known {
                    return Err(AppError::NotFound(format!(
                        "no session found for id: {session_id}"
                    )));
                }

                let participant_id = Uuid::new_v4().to_string();
                let inserted = tx
                    .execute(
                        "INSERT INTO participants
                             (id, session_id, booker_email, start_date, duration_weeks, paid, created_at)
                         SELECT ?1, ?2, ?3, ?4, ?5, 0, ?6
                         WHERE (SELECT COUNT(*) FROM participants WHERE session_id = ?2)
                               < (SELECT participant_limit FROM sessions WHERE id = ?2)",
                        rusqlite::params![
                            participant_id,
                            session_id,
                            req.booker_email,
                            req.start_date,
                            req.duration_weeks,
                            now
                        ],
                    )
                    .map_err(|e| {
                        if is_constraint_violation(&e) {
                            AppError::Conflict(format!(
                                "participant already booked for session id: {session_id}"
                            ))
                        } else {
                            AppError::Database(e)
                        }
                    })?;
                if inserted == 0 {
                    return Err(AppError::Conflict(format!(
                        "class full for session id: {session_id}"
                    )));
                }

                added.push(Participant {
                    id: participant_id,
                    session_id: session_id.clone(),
                    booker_email: req.booker_email.clone(),
                    payment_ref: None,
                    start_date: req.start_date.clone(),
                    duration_weeks: req.duration_weeks,
                    paid: false,
                    accepted_at: None,
                });
            }

            tx.commit()?;
            Ok(added)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Remove the booker's entries across the trainer's whole schedule.
    /// Not-found covers both an unknown trainer and an email no session held.
    pub async fn remove_participant(
        &self,
        trainer_name: &str,
        booker_email: &str,
    ) -> Result<usize> {
        let pool = self.pool.clone();
        let trainer_name = trainer_name.to_string();
        let booker_email = booker_email.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let trainer_id = trainer_id_by_name(&conn, &trainer_name)?
                .ok_or_else(|| AppError::NotFound(format!("trainer not found: {trainer_name}")))?;
            let removed = conn.execute(
                "DELETE FROM participants WHERE booker_email = ? AND session_id IN
                 (SELECT id FROM sessions WHERE trainer_id = ?)",
                rusqlite::params![booker_email, trainer_id],
            )?;
            if removed == 0 {
                return Err(AppError::NotFound(format!(
                    "no booking found for email: {booker_email}"
                )));
            }
            Ok(removed)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Clear every participant list for the trainer. Irreversible.
    pub async fn reset_participants(&self, trainer_name: &str) -> Result<usize> {
        let pool = self.pool.clone();
        let trainer_name = trainer_name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let trainer_id = trainer_id_by_name(&conn, &trainer_name)?
                .ok_or_else(|| AppError::NotFound(format!("trainer not found: {trainer_name}")))?;
            let removed = conn.execute(
                "DELETE FROM participants WHERE session_id IN
                 (SELECT id FROM sessions WHERE trainer_id = ?)",
                [&trainer_id],
            )?;
            Ok(removed)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Read-only preflight for a booking request. Classifies every requested
    /// session id as unknown, full, or bookable; unknown ids take priority
    /// over full ones when both occur in the same request.
    pub async fn validate(&self, trainer_name: &str, session_ids: Vec<String>) -> Result<Validation> {
        let pool = self.pool.clone();
        let trainer_name = trainer_name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let trainer_id = trainer_id_by_name(&conn, &trainer_name)?
                .ok_or_else(|| AppError::NotFound(format!("trainer not found: {trainer_name}")))?;

            let mut stmt = conn.prepare(
                "SELECT s.id, s.participant_limit,
                        (SELECT COUNT(*) FROM participants p WHERE p.session_id = s.id) AS occupancy
                 FROM sessions s WHERE s.trainer_id = ?",
            )?;
            let slots: HashMap<String, (i64, i64)> = stmt
                .query_map([&trainer_id], |row| {
                    Ok((row.get::<_, String>(0)?, (row.get(1)?, row.get(2)?)))
                })?
                .collect::<rusqlite::Result<_>>()?;

            let mut missing = Vec::new();
            let mut full = Vec::new();
            for session_id in &session_ids {
                match slots.get(session_id) {
                    None => missing.push(session_id.clone()),
                    Some((limit, occupancy)) if occupancy >= limit => full.push(session_id.clone()),
                    Some(_) => {}
                }
            }

            if !missing.is_empty() {
                return Ok(Validation::rejected(format!(
                    "no session found for id: {}",
                    missing.join(", ")
                )));
            }
            if !full.is_empty() {
                return Ok(Validation::rejected(format!(
                    "class full for session id: {}",
                    full.join(", ")
                )));
            }
            Ok(Validation::ok())
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Bulk-mark the booker's participant entries as paid across the
    /// requested sessions, stamping the payment reference and acceptance
    /// timestamp. Writes commit in one transaction per trainer whose schedule
    /// is touched; sessions that cannot be updated are reported, not fatal.
    pub async fn accept_booking(&self, req: AcceptBooking) -> Result<AcceptanceOutcome> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            // Resolve each requested session to its owning trainer, keeping
            // request order within each trainer group.
            let mut by_trainer: Vec<(String, String, Vec<String>)> = Vec::new();
            let mut skipped = Vec::new();
            for session_id in &req.session_ids {
                let owner = conn
                    .query_row(
                        "SELECT t.id, t.name FROM sessions s
                         JOIN trainers t ON s.trainer_id = t.id
                         WHERE s.id = ?",
                        [session_id],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                    )
                    .optional()?;
                match owner {
                    Some((trainer_id, trainer_name)) => {
                        match by_trainer.iter_mut().find(|(id, _, _)| *id == trainer_id) {
                            Some((_, _, ids)) => ids.push(session_id.clone()),
                            None => by_trainer.push((trainer_id, trainer_name, vec![session_id.clone()])),
                        }
                    }
                    None => skipped.push(SkippedSession {
                        session_id: session_id.clone(),
                        reason: "no session found".to_string(),
                    }),
                }
            }

            let mut updated = Vec::new();
            let mut start_date = None;
            let mut duration_weeks = None;
            let mut trainer = None;

            for (_trainer_id, trainer_name, session_ids) in &by_trainer {
                let tx = conn.transaction()?;
                for session_id in session_ids {
                    let occupancy: i64 = tx.query_row(
                        "SELECT COUNT(*) FROM participants WHERE session_id = ?",
                        [session_id],
                        |row| row.get(0),
                    )?;
                    if occupancy == 0 {
                        skipped.push(SkippedSession {
                            session_id: session_id.clone(),
                            reason: "no participants".to_string(),
                        });
                        continue;
                    }

                    let stamped = tx.execute(
                        "UPDATE participants
                         SET paid = 1, payment_ref = ?, accepted_at = ?
                         WHERE session_id = ? AND booker_email = ?",
                        rusqlite::params![
                            req.payment_ref,
                            req.accepted_at,
                            session_id,
                            req.booker_email
                        ],
                    )?;
                    if stamped == 0 {
                        skipped.push(SkippedSession {
                            session_id: session_id.clone(),
                            reason: "no matching email".to_string(),
                        });
                        continue;
                    }

                    if start_date.is_none() {
                        let (date, weeks) = tx.query_row(
                            "SELECT start_date, duration_weeks FROM participants
                             WHERE session_id = ? AND booker_email = ?",
                            rusqlite::params![session_id, req.booker_email],
                            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                        )?;
                        start_date = Some(date);
                        duration_weeks = Some(weeks);
                        trainer = Some(trainer_name.clone());
                    }
                    updated.push(session_id.clone());
                }
                tx.commit()?;
            }

            Ok(AcceptanceOutcome {
                updated,
                skipped,
                trainer,
                start_date,
                duration_weeks,
            })
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;
    use crate::migrations::run_migrations_for_tests;

    fn setup_test_db() -> DbPool {
        let pool = create_memory_pool().expect("Failed to create test database");
        run_migrations_for_tests(&pool).expect("Failed to run migrations");
        pool
    }

    fn yoga_session(id: &str, day: &str, time: &str, limit: i64) -> NewSession {
        NewSession {
            id: id.to_string(),
            day: day.to_string(),
            start_time: time.to_string(),
            class_type: "Yoga".to_string(),
            participant_limit: limit,
        }
    }

    fn booking(session_ids: &[&str], email: &str) -> AddParticipants {
        AddParticipants {
            session_ids: session_ids.iter().map(|s| s.to_string()).collect(),
            booker_email: email.to_string(),
            start_date: "01-06-2026".to_string(),
            duration_weeks: 4,
        }
    }

    async fn alice_with_one_slot(repo: &ScheduleRepository, limit: i64) {
        repo.put_schedule(
            "Alice",
            vec![yoga_session("Yoga-Monday-08:00", "Monday", "08:00", limit)],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_get_schedule_unknown_trainer() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);

        assert!(repo.get_schedule("Nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_schedule_nests_by_day_and_time() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);

        let schedule = repo
            .put_schedule(
                "Alice",
                vec![
                    yoga_session("Yoga-Monday-08:00", "Monday", "08:00", 10),
                    yoga_session("Yoga-Monday-10:00", "Monday", "10:00", 10),
                    yoga_session("Yoga-Friday-18:00", "Friday", "18:00", 5),
                ],
            )
            .await
            .unwrap();

        assert_eq!(schedule.trainer, "Alice");
        assert_eq!(schedule.days.len(), 2);
        assert_eq!(schedule.days[&Day::Monday].len(), 2);
        assert_eq!(
            schedule.days[&Day::Friday]["18:00"].id,
            "Yoga-Friday-18:00"
        );
    }

    #[tokio::test]
    async fn test_put_schedule_rejects_bad_day() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);

        let result = repo
            .put_schedule("Alice", vec![yoga_session("x", "Someday", "08:00", 5)])
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_hyphenated_trainer_name_is_legal() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);

        repo.put_schedule(
            "Anne-Marie",
            vec![yoga_session("Spin-Tuesday-09:00", "Tuesday", "09:00", 8)],
        )
        .await
        .unwrap();

        let detail = repo
            .find_session_by_id("Spin-Tuesday-09:00")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.trainer, "Anne-Marie");
        assert_eq!(detail.day, Day::Tuesday);
    }

    #[tokio::test]
    async fn test_find_session_exact_match_only() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 10).await;

        let hit = repo
            .find_session("Alice", Day::Monday, "08:00")
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = repo
            .find_session("Alice", Day::Monday, "08:30")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_add_then_remove_round_trips() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 10).await;

        repo.add_participant("Alice", booking(&["Yoga-Monday-08:00"], "a@x.com"))
            .await
            .unwrap();
        repo.remove_participant("Alice", "a@x.com").await.unwrap();

        let detail = repo
            .find_session_by_id("Yoga-Monday-08:00")
            .await
            .unwrap()
            .unwrap();
        assert!(detail.participants.is_empty());
    }

    #[tokio::test]
    async fn test_add_enforces_capacity() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 1).await;

        repo.add_participant("Alice", booking(&["Yoga-Monday-08:00"], "a@x.com"))
            .await
            .unwrap();
        let result = repo
            .add_participant("Alice", booking(&["Yoga-Monday-08:00"], "b@x.com"))
            .await;

        match result {
            Err(AppError::Conflict(msg)) => {
                assert_eq!(msg, "class full for session id: Yoga-Monday-08:00")
            }
            other => panic!("expected conflict, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate_email() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 10).await;

        repo.add_participant("Alice", booking(&["Yoga-Monday-08:00"], "a@x.com"))
            .await
            .unwrap();
        let result = repo
            .add_participant("Alice", booking(&["Yoga-Monday-08:00"], "a@x.com"))
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_add_is_all_or_nothing_across_sessions() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        repo.put_schedule(
            "Alice",
            vec![
                yoga_session("Yoga-Monday-08:00", "Monday", "08:00", 10),
                yoga_session("Yoga-Friday-18:00", "Friday", "18:00", 1),
            ],
        )
        .await
        .unwrap();

        // Fill Friday, then ask for both slots at once.
        repo.add_participant("Alice", booking(&["Yoga-Friday-18:00"], "taken@x.com"))
            .await
            .unwrap();
        let result = repo
            .add_participant(
                "Alice",
                booking(&["Yoga-Monday-08:00", "Yoga-Friday-18:00"], "b@x.com"),
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        // Monday must be untouched.
        let monday = repo
            .find_session_by_id("Yoga-Monday-08:00")
            .await
            .unwrap()
            .unwrap();
        assert!(monday.participants.is_empty());
    }

    #[tokio::test]
    async fn test_add_unknown_session_is_not_found() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 10).await;

        let result = repo
            .add_participant("Alice", booking(&["Pilates-Sunday-07:00"], "a@x.com"))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_unknown_email_is_not_found() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 10).await;

        let result = repo.remove_participant("Alice", "ghost@x.com").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reset_clears_all_sessions() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        repo.put_schedule(
            "Alice",
            vec![
                yoga_session("Yoga-Monday-08:00", "Monday", "08:00", 10),
                yoga_session("Yoga-Friday-18:00", "Friday", "18:00", 10),
            ],
        )
        .await
        .unwrap();
        repo.add_participant(
            "Alice",
            booking(&["Yoga-Monday-08:00", "Yoga-Friday-18:00"], "a@x.com"),
        )
        .await
        .unwrap();

        let removed = repo.reset_participants("Alice").await.unwrap();
        assert_eq!(removed, 2);

        let schedule = repo.get_schedule("Alice").await.unwrap().unwrap();
        for slots in schedule.days.values() {
            for slot in slots.values() {
                assert!(slot.participants.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_validate_ok() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 1).await;

        let verdict = repo
            .validate("Alice", vec!["Yoga-Monday-08:00".to_string()])
            .await
            .unwrap();
        assert_eq!(verdict, Validation::ok());
    }

    #[tokio::test]
    async fn test_validate_full_at_exact_capacity() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 1).await;
        repo.add_participant("Alice", booking(&["Yoga-Monday-08:00"], "a@x.com"))
            .await
            .unwrap();

        let verdict = repo
            .validate("Alice", vec!["Yoga-Monday-08:00".to_string()])
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Validation::rejected("class full for session id: Yoga-Monday-08:00".to_string())
        );
    }

    #[tokio::test]
    async fn test_validate_not_found_wins_over_full() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 1).await;
        repo.add_participant("Alice", booking(&["Yoga-Monday-08:00"], "a@x.com"))
            .await
            .unwrap();

        let verdict = repo
            .validate(
                "Alice",
                vec![
                    "Yoga-Monday-08:00".to_string(),
                    "Pilates-Sunday-07:00".to_string(),
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Validation::rejected("no session found for id: Pilates-Sunday-07:00".to_string())
        );
    }

    #[tokio::test]
    async fn test_accept_booking_stamps_payment() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        alice_with_one_slot(&repo, 10).await;
        repo.add_participant("Alice", booking(&["Yoga-Monday-08:00"], "a@x.com"))
            .await
            .unwrap();

        let outcome = repo
            .accept_booking(AcceptBooking {
                session_ids: vec!["Yoga-Monday-08:00".to_string()],
                booker_email: "a@x.com".to_string(),
                payment_ref: "pi_123".to_string(),
                accepted_at: "2026-06-01T10:00:00Z".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(outcome.updated, vec!["Yoga-Monday-08:00".to_string()]);
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.trainer.as_deref(), Some("Alice"));
        assert_eq!(outcome.start_date.as_deref(), Some("01-06-2026"));

        let detail = repo
            .find_session_by_id("Yoga-Monday-08:00")
            .await
            .unwrap()
            .unwrap();
        let participant = &detail.participants[0];
        assert!(participant.paid);
        assert_eq!(participant.payment_ref.as_deref(), Some("pi_123"));
        assert_eq!(
            participant.accepted_at.as_deref(),
            Some("2026-06-01T10:00:00Z")
        );
    }

    #[tokio::test]
    async fn test_accept_booking_tracks_skip_reasons() {
        let pool = setup_test_db();
        let repo = ScheduleRepository::new(pool);
        repo.put_schedule(
            "Alice",
            vec![
                yoga_session("Yoga-Monday-08:00", "Monday", "08:00", 10),
                yoga_session("Yoga-Friday-18:00", "Friday", "18:00", 10),
            ],
        )
        .await
        .unwrap();
        // Monday has a different booker; Friday is empty.
        repo.add_participant("Alice", booking(&["Yoga-Monday-08:00"], "other@x.com"))
            .await
            .unwrap();

        let outcome = repo
            .accept_booking(AcceptBooking {
                session_ids: vec![
                    "Yoga-Monday-08:00".to_string(),
                    "Yoga-Friday-18:00".to_string(),
                    "Ghost-Sunday-07:00".to_string(),
                ],
                booker_email: "a@x.com".to_string(),
                payment_ref: "pi_123".to_string(),
                accepted_at: "2026-06-01T10:00:00Z".to_string(),
            })
            .await
            .unwrap();

        assert!(outcome.updated.is_empty());
        let reasons: Vec<(&str, &str)> = outcome
            .skipped
            .iter()
            .map(|s| (s.session_id.as_str(), s.reason.as_str()))
            .collect();
        assert!(reasons.contains(&("Yoga-Monday-08:00", "no matching email")));
        assert!(reasons.contains(&("Yoga-Friday-18:00", "no participants")));
        assert!(reasons.contains(&("Ghost-Sunday-07:00", "no session found")));
    }
}
