use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::FromSqliteRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemberTier {
    #[default]
    Bronze,
    Silver,
    Gold,
}

impl MemberTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberTier::Bronze => "Bronze",
            MemberTier::Silver => "Silver",
            MemberTier::Gold => "Gold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Bronze" => Some(MemberTier::Bronze),
            "Silver" => Some(MemberTier::Silver),
            "Gold" => Some(MemberTier::Gold),
            _ => None,
        }
    }
}

/// A gym member. `banned_until` is RFC 3339 and unset by the ban sweep;
/// `tier_expires_at` is `dd-mm-yyyyThh:mm` and drives the tier downgrade
/// sweep.
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
    pub tier: MemberTier,
    pub tier_expires_at: Option<String>,
    pub banned_until: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromSqliteRow for Member {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let tier_str: String = row.get("tier")?;
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            tier: MemberTier::parse(&tier_str).unwrap_or_default(),
            tier_expires_at: row.get("tier_expires_at")?,
            banned_until: row.get("banned_until")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMember {
    pub name: String,
    pub email: String,
    pub tier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BanMember {
    /// RFC 3339 timestamp the ban lasts until.
    pub until: String,
}

#[derive(Debug, Deserialize)]
pub struct SetTier {
    pub tier: String,
    /// `dd-mm-yyyyThh:mm`; absent means the tier does not expire.
    pub expires_at: Option<String>,
}
