//! SQLite-backed user directory store.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::types::UserRecord;
use crate::db::{from_millis, Db};
use crate::error::{Error, Result};

const USER_COLUMNS: &str =
    "user_id, email, username, name, picture, is_online, last_seen, created_at";

/// User directory backed by the shared SQLite handle.
#[derive(Clone)]
pub struct Directory {
    db: Db,
}

impl Directory {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
        Ok(UserRecord {
            user_id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            name: row.get(3)?,
            picture: row.get(4)?,
            is_online: row.get::<_, i64>(5)? != 0,
            last_seen: row
                .get::<_, Option<i64>>(6)?
                .and_then(DateTime::from_timestamp_millis),
            created_at: from_millis(row.get(7)?),
        })
    }

    /// Insert or update a user's profile fields. `created_at`, presence
    /// fields, and any existing username are preserved on update; a supplied
    /// username is claimed, with the UNIQUE column rejecting takeovers.
    pub fn upsert(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
        picture: &str,
        username: Option<&str>,
    ) -> Result<UserRecord> {
        let now = Utc::now().timestamp_millis();
        {
            let conn = self.db.lock();
            conn.execute(
                "INSERT INTO users (user_id, email, name, picture, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                     email = excluded.email,
                     name = excluded.name,
                     picture = excluded.picture",
                params![user_id, email, name, picture, now],
            )?;

            if let Some(username) = username {
                match conn.execute(
                    "UPDATE users SET username = ?1 WHERE user_id = ?2",
                    params![username, user_id],
                ) {
                    Ok(_) => {}
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        return Err(Error::Conflict("Username already taken".into()));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        self.find_by_id(user_id)?
            .ok_or_else(|| Error::Unavailable("Upsert readback failed".into()))
    }

    pub fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let conn = self.db.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
            params![user_id],
            Self::row_to_record,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Exact username match. Stored usernames are normalized lowercase, so a
    /// case-variant query falls back to its lowercased form.
    pub fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let trimmed = username.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        if let Some(user) = self.query_username(trimmed)? {
            return Ok(Some(user));
        }

        let lowered = trimmed.to_lowercase();
        if lowered != trimmed {
            return self.query_username(&lowered);
        }
        Ok(None)
    }

    fn query_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let conn = self.db.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            params![username],
            Self::row_to_record,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Whether a (normalized) username is unclaimed.
    pub fn username_available(&self, username: &str) -> Result<bool> {
        Ok(self.query_username(username)?.is_none())
    }

    /// Mirror a presence transition onto the user row. Returns false if the
    /// user has no record yet — the relay broadcasts regardless.
    pub fn set_presence(
        &self,
        user_id: &str,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.db.lock();
        let changed = conn.execute(
            "UPDATE users SET is_online = ?1, last_seen = ?2 WHERE user_id = ?3",
            params![is_online as i64, last_seen.timestamp_millis(), user_id],
        )?;
        Ok(changed > 0)
    }
}
