//! Periodic expiry sweeps.
//!
//! Five independent jobs share one shape: load every candidate row of one
//! table, normalize its date field through [`crate::dates`], apply a single
//! mutation when the expiry boundary has passed (inclusive, `expiry <= now`),
//! and log the outcome per item. A row whose date fails to parse is logged
//! and skipped; the sweep keeps going. Terminal states are never candidates,
//! so a second run with no intervening writes mutates nothing.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::dates::{self, DateFormat};
use crate::db::DbPool;
use crate::error::{AppError, Result};

/// Pending booking requests expire after this many days without acceptance.
const PENDING_EXPIRY_DAYS: i64 = 7;

/// Row counts mutated by one pass over all five sweeps.
#[derive(Debug, Default, Serialize)]
pub struct SweepOutcome {
    pub pending_expired: usize,
    pub accepted_ended: usize,
    pub bans_lifted: usize,
    pub tiers_downgraded: usize,
    pub classes_completed: usize,
}

impl SweepOutcome {
    pub fn total(&self) -> usize {
        self.pending_expired
            + self.accepted_ended
            + self.bans_lifted
            + self.tiers_downgraded
            + self.classes_completed
    }
}

/// Run all five sweeps once.
pub async fn run_all(pool: &DbPool, now: DateTime<Utc>) -> Result<SweepOutcome> {
    let outcome = SweepOutcome {
        pending_expired: expire_pending_requests(pool, now).await?,
        accepted_ended: end_accepted_bookings(pool, now).await?,
        bans_lifted: lift_expired_bans(pool, now).await?,
        tiers_downgraded: downgrade_expired_tiers(pool, now).await?,
        classes_completed: complete_past_classes(pool, now).await?,
    };
    tracing::info!(
        pending_expired = outcome.pending_expired,
        accepted_ended = outcome.accepted_ended,
        bans_lifted = outcome.bans_lifted,
        tiers_downgraded = outcome.tiers_downgraded,
        classes_completed = outcome.classes_completed,
        "sweep pass complete"
    );
    Ok(outcome)
}

/// Drive [`run_all`] on a fixed interval until the process exits.
pub async fn run_forever(pool: DbPool, interval_secs: u64) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        if let Err(e) = run_all(&pool, Utc::now()).await {
            tracing::error!("sweep pass failed: {e}");
        }
    }
}

/// Pending -> Expired once a request has sat unaccepted for 7 days.
pub async fn expire_pending_requests(pool: &DbPool, now: DateTime<Utc>) -> Result<usize> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, booked_at FROM booking_requests WHERE status = 'Pending'")?;
        let candidates = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut expired = 0;
        for (id, booked_at) in candidates {
            let booked = match dates::parse_utc(DateFormat::Rfc3339, &booked_at) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("skipping booking request {id}: {e}");
                    continue;
                }
            };
            if booked + Duration::days(PENDING_EXPIRY_DAYS) <= now {
                conn.execute(
                    "UPDATE booking_requests SET status = 'Expired' WHERE id = ?",
                    [&id],
                )?;
                tracing::info!("booking request {id} expired (booked at {booked_at})");
                expired += 1;
            }
        }
        Ok(expired)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Accepted -> Ended once `start_at + duration_weeks * 7 days` has passed.
pub async fn end_accepted_bookings(pool: &DbPool, now: DateTime<Utc>) -> Result<usize> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, start_at, duration_weeks FROM accepted_bookings WHERE status = 'Accepted'",
        )?;
        let candidates = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut ended = 0;
        for (id, start_at, weeks) in candidates {
            let start = match dates::parse_utc(DateFormat::DayMonthYear, &start_at) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("skipping accepted booking {id}: {e}");
                    continue;
                }
            };
            if start + Duration::weeks(weeks) <= now {
                conn.execute(
                    "UPDATE accepted_bookings SET status = 'Ended' WHERE id = ?",
                    [&id],
                )?;
                tracing::info!("accepted booking {id} ended ({weeks} weeks from {start_at})");
                ended += 1;
            }
        }
        Ok(ended)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Unset `banned_until` for members whose ban has run out.
pub async fn lift_expired_bans(pool: &DbPool, now: DateTime<Utc>) -> Result<usize> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stmt =
            conn.prepare("SELECT email, banned_until FROM members WHERE banned_until IS NOT NULL")?;
        let candidates = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut lifted = 0;
        for (email, banned_until) in candidates {
            let until = match dates::parse_utc(DateFormat::Rfc3339, &banned_until) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("skipping ban for {email}: {e}");
                    continue;
                }
            };
            if until <= now {
                conn.execute(
                    "UPDATE members SET banned_until = NULL WHERE email = ?",
                    [&email],
                )?;
                tracing::info!("ban lifted for {email} (expired {banned_until})");
                lifted += 1;
            }
        }
        Ok(lifted)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Drop members back to Bronze once their tier subscription has run out.
pub async fn downgrade_expired_tiers(pool: &DbPool, now: DateTime<Utc>) -> Result<usize> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        let mut stmt = conn
            .prepare("SELECT email, tier_expires_at FROM members WHERE tier_expires_at IS NOT NULL")?;
        let candidates = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut downgraded = 0;
        for (email, expires_at) in candidates {
            let expiry = match dates::parse_utc(DateFormat::DayMonthYearTime, &expires_at) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("skipping tier for {email}: {e}");
                    continue;
                }
            };
            if expiry <= now {
                conn.execute(
                    "UPDATE members SET tier = 'Bronze', tier_expires_at = NULL WHERE email = ?",
                    [&email],
                )?;
                tracing::info!("tier downgraded for {email} (expired {expires_at})");
                downgraded += 1;
            }
        }
        Ok(downgraded)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Move class bookings whose date has passed into the completed table
/// (copy+delete, matching the booking tables' ownership model).
pub async fn complete_past_classes(pool: &DbPool, now: DateTime<Utc>) -> Result<usize> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let mut stmt = conn
            .prepare("SELECT id, class_name, booker_email, class_date FROM class_bookings")?;
        let candidates = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let mut completed = 0;
        for (id, class_name, booker_email, class_date) in candidates {
            let date = match dates::parse_utc(DateFormat::DayMonthYear, &class_date) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("skipping class booking {id}: {e}");
                    continue;
                }
            };
            if date <= now {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO completed_class_bookings
                         (id, class_name, booker_email, class_date, completed_at)
                     VALUES (?, ?, ?, ?, ?)",
                    rusqlite::params![id, class_name, booker_email, class_date, now.to_rfc3339()],
                )?;
                tx.execute("DELETE FROM class_bookings WHERE id = ?", [&id])?;
                tx.commit()?;
                tracing::info!("class booking {id} completed ({class_name} on {class_date})");
                completed += 1;
            }
        }
        Ok(completed)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;
    use crate::migrations::run_migrations_for_tests;
    use chrono::TimeZone;

    fn setup_test_db() -> DbPool {
        let pool = create_memory_pool().expect("Failed to create test database");
        run_migrations_for_tests(&pool).expect("Failed to run migrations");
        pool
    }

    fn insert_request(pool: &DbPool, id: &str, booked_at: DateTime<Utc>) {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO booking_requests (id, trainer_name, session_ids, booker_email, status, booked_at)
             VALUES (?, 'Alice', '[\"Yoga-Monday-08:00\"]', 'a@x.com', 'Pending', ?)",
            rusqlite::params![id, booked_at.to_rfc3339()],
        )
        .unwrap();
    }

    fn request_status(pool: &DbPool, id: &str) -> String {
        let conn = pool.get().unwrap();
        conn.query_row(
            "SELECT status FROM booking_requests WHERE id = ?",
            [id],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn insert_member(pool: &DbPool, email: &str, tier: &str, tier_expires_at: Option<&str>, banned_until: Option<&str>) {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO members (id, name, email, tier, tier_expires_at, banned_until, created_at)
             VALUES (?, 'Bob', ?, ?, ?, ?, ?)",
            rusqlite::params![
                uuid::Uuid::new_v4().to_string(),
                email,
                tier,
                tier_expires_at,
                banned_until,
                Utc::now()
            ],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_pending_request_expires_after_seven_days() {
        let pool = setup_test_db();
        let now = Utc::now();
        insert_request(&pool, "old", now - Duration::days(8));
        insert_request(&pool, "fresh", now - Duration::days(6));

        let expired = expire_pending_requests(&pool, now).await.unwrap();

        assert_eq!(expired, 1);
        assert_eq!(request_status(&pool, "old"), "Expired");
        assert_eq!(request_status(&pool, "fresh"), "Pending");
    }

    #[tokio::test]
    async fn test_boundary_is_inclusive() {
        let pool = setup_test_db();
        let now = Utc::now();
        insert_request(&pool, "boundary", now - Duration::days(PENDING_EXPIRY_DAYS));

        let expired = expire_pending_requests(&pool, now).await.unwrap();

        assert_eq!(expired, 1);
        assert_eq!(request_status(&pool, "boundary"), "Expired");
    }

    #[tokio::test]
    async fn test_unparseable_date_is_skipped_fail_open() {
        let pool = setup_test_db();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO booking_requests (id, trainer_name, session_ids, booker_email, status, booked_at)
                 VALUES ('bad', 'Alice', '[]', 'a@x.com', 'Pending', 'not-a-date')",
                [],
            )
            .unwrap();
        }
        insert_request(&pool, "old", Utc::now() - Duration::days(30));

        let expired = expire_pending_requests(&pool, Utc::now()).await.unwrap();

        // The broken row is skipped, the valid one still transitions.
        assert_eq!(expired, 1);
        assert_eq!(request_status(&pool, "bad"), "Pending");
        assert_eq!(request_status(&pool, "old"), "Expired");
    }

    #[tokio::test]
    async fn test_accepted_booking_ends_exactly_at_expiry() {
        let pool = setup_test_db();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO accepted_bookings
                     (id, trainer_name, session_ids, booker_email, payment_ref,
                      status, start_at, duration_weeks, accepted_at)
                 VALUES ('b1', 'Alice', '[]', 'a@x.com', 'pi_1',
                         'Accepted', '01-06-2026', 4, '2026-06-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }
        // Expiry is start + 4 weeks = 29-06-2026 00:00, exactly "now".
        let now = Utc.with_ymd_and_hms(2026, 6, 29, 0, 0, 0).unwrap();

        let ended = end_accepted_bookings(&pool, now).await.unwrap();
        assert_eq!(ended, 1);

        // One second before the boundary nothing would have moved.
        let pool2 = setup_test_db();
        {
            let conn = pool2.get().unwrap();
            conn.execute(
                "INSERT INTO accepted_bookings
                     (id, trainer_name, session_ids, booker_email, payment_ref,
                      status, start_at, duration_weeks, accepted_at)
                 VALUES ('b1', 'Alice', '[]', 'a@x.com', 'pi_1',
                         'Accepted', '01-06-2026', 4, '2026-06-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }
        let just_before = Utc.with_ymd_and_hms(2026, 6, 28, 23, 59, 59).unwrap();
        assert_eq!(end_accepted_bookings(&pool2, just_before).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ban_sweep_unsets_expired_bans_only() {
        let pool = setup_test_db();
        let now = Utc::now();
        insert_member(
            &pool,
            "served@x.com",
            "Bronze",
            None,
            Some(&(now - Duration::hours(1)).to_rfc3339()),
        );
        insert_member(
            &pool,
            "still@x.com",
            "Bronze",
            None,
            Some(&(now + Duration::days(1)).to_rfc3339()),
        );

        let lifted = lift_expired_bans(&pool, now).await.unwrap();
        assert_eq!(lifted, 1);

        let conn = pool.get().unwrap();
        let served: Option<String> = conn
            .query_row(
                "SELECT banned_until FROM members WHERE email = 'served@x.com'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(served.is_none());
        let still: Option<String> = conn
            .query_row(
                "SELECT banned_until FROM members WHERE email = 'still@x.com'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(still.is_some());
    }

    #[tokio::test]
    async fn test_tier_sweep_downgrades_to_bronze() {
        let pool = setup_test_db();
        insert_member(&pool, "gold@x.com", "Gold", Some("01-01-2020T00:00"), None);

        let now = Utc::now();
        let downgraded = downgrade_expired_tiers(&pool, now).await.unwrap();
        assert_eq!(downgraded, 1);

        let conn = pool.get().unwrap();
        let (tier, expires): (String, Option<String>) = conn
            .query_row(
                "SELECT tier, tier_expires_at FROM members WHERE email = 'gold@x.com'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(tier, "Bronze");
        assert!(expires.is_none());
    }

    #[tokio::test]
    async fn test_class_sweep_moves_rows() {
        let pool = setup_test_db();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO class_bookings (id, class_name, booker_email, class_date)
                 VALUES ('c1', 'Spin', 'a@x.com', '01-01-2020'),
                        ('c2', 'Spin', 'b@x.com', '01-01-2099')",
                [],
            )
            .unwrap();
        }

        let completed = complete_past_classes(&pool, Utc::now()).await.unwrap();
        assert_eq!(completed, 1);

        let conn = pool.get().unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM class_bookings", [], |row| row.get(0))
            .unwrap();
        let moved: i64 = conn
            .query_row("SELECT COUNT(*) FROM completed_class_bookings", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(remaining, 1);
        assert_eq!(moved, 1);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let pool = setup_test_db();
        let now = Utc::now();
        insert_request(&pool, "old", now - Duration::days(10));
        insert_member(
            &pool,
            "bob@x.com",
            "Gold",
            Some("01-01-2020T00:00"),
            Some(&(now - Duration::hours(1)).to_rfc3339()),
        );
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO class_bookings (id, class_name, booker_email, class_date)
                 VALUES ('c1', 'Spin', 'a@x.com', '01-01-2020')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO accepted_bookings
                     (id, trainer_name, session_ids, booker_email, payment_ref,
                      status, start_at, duration_weeks, accepted_at)
                 VALUES ('b1', 'Alice', '[]', 'a@x.com', 'pi_1',
                         'Accepted', '01-01-2020', 1, '2020-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }

        let first = run_all(&pool, now).await.unwrap();
        assert_eq!(first.total(), 5);

        let second = run_all(&pool, now).await.unwrap();
        assert_eq!(second.total(), 0);
    }
}
