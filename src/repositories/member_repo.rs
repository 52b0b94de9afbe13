use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::dates::{self, DateFormat};
use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::models::{FromSqliteRow, Member, MemberTier};

#[derive(Clone)]
pub struct MemberRepository {
    pool: DbPool,
}

impl MemberRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, email: &str, tier: MemberTier) -> Result<Member> {
        let member = Member {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            tier,
            tier_expires_at: None,
            banned_until: None,
            created_at: Utc::now(),
        };
        let record = member.clone();

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO members (id, name, email, tier, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                rusqlite::params![
                    record.id,
                    record.name,
                    record.email,
                    record.tier.as_str(),
                    record.created_at
                ],
            )
            .map_err(|e| {
                if matches!(
                    &e,
                    rusqlite::Error::SqliteFailure(f, _)
                        if f.code == rusqlite::ErrorCode::ConstraintViolation
                ) {
                    AppError::Conflict(format!("member already exists: {}", record.email))
                } else {
                    AppError::Database(e)
                }
            })?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

        Ok(member)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Member>> {
        let pool = self.pool.clone();
        let email = email.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare("SELECT * FROM members WHERE email = ?")?;
            let member = stmt.query_row([&email], Member::from_row).optional()?;
            Ok(member)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    pub async fn find_all(&self) -> Result<Vec<Member>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare("SELECT * FROM members ORDER BY name")?;
            let members = stmt
                .query_map([], Member::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(members)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    pub async fn delete_by_email(&self, email: &str) -> Result<bool> {
        let pool = self.pool.clone();
        let email = email.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let rows = conn.execute("DELETE FROM members WHERE email = ?", [&email])?;
            Ok(rows > 0)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Ban until the given RFC 3339 timestamp. The ban sweep unsets the field
    /// once the timestamp has passed.
    pub async fn ban(&self, email: &str, until: &str) -> Result<bool> {
        if dates::parse_utc(DateFormat::Rfc3339, until).is_err() {
            return Err(AppError::BadRequest(format!(
                "invalid ban expiry: {until} (expected RFC 3339)"
            )));
        }
        let pool = self.pool.clone();
        let email = email.to_string();
        let until = until.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let rows = conn.execute(
                "UPDATE members SET banned_until = ? WHERE email = ?",
                rusqlite::params![until, email],
            )?;
            Ok(rows > 0)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Set the member's tier, optionally time-bounded (`dd-mm-yyyyThh:mm`).
    pub async fn set_tier(
        &self,
        email: &str,
        tier: MemberTier,
        expires_at: Option<&str>,
    ) -> Result<bool> {
        if let Some(raw) = expires_at {
            if dates::parse_utc(DateFormat::DayMonthYearTime, raw).is_err() {
                return Err(AppError::BadRequest(format!(
                    "invalid tier expiry: {raw} (expected dd-mm-yyyyThh:mm)"
                )));
            }
        }
        let pool = self.pool.clone();
        let email = email.to_string();
        let expires_at = expires_at.map(|s| s.to_string());
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let rows = conn.execute(
                "UPDATE members SET tier = ?, tier_expires_at = ? WHERE email = ?",
                rusqlite::params![tier.as_str(), expires_at, email],
            )?;
            Ok(rows > 0)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Whether the member is currently banned. Unknown members are not
    /// banned; an unparseable stored expiry is treated as banned until the
    /// ban sweep deals with it.
    pub async fn is_banned(&self, email: &str, now: chrono::DateTime<Utc>) -> Result<bool> {
        let member = match self.find_by_email(email).await? {
            Some(m) => m,
            None => return Ok(false),
        };
        let Some(raw) = member.banned_until else {
            return Ok(false);
        };
        match dates::parse_utc(DateFormat::Rfc3339, &raw) {
            Ok(until) => Ok(now < until),
            Err(_) => Ok(true),
        }
    }
}
