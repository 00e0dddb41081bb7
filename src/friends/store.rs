//! SQLite-backed friend-request store.
//!
//! Every mutation is a single conditional statement, so concurrent
//! duplicate accepts/rejects race safely: the first matches and mutates,
//! the second matches nothing.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::types::{FriendRequestRecord, RequestStatus};
use crate::db::{from_millis, Db};
use crate::error::{Error, Result};

const REQUEST_COLUMNS: &str = "id, requester_id, receiver_id, status, created_at";

/// Friend-request store backed by the shared SQLite handle.
#[derive(Clone)]
pub struct FriendStore {
    db: Db,
}

impl FriendStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FriendRequestRecord> {
        let status: String = row.get(3)?;
        Ok(FriendRequestRecord {
            id: row.get(0)?,
            requester_id: row.get(1)?,
            receiver_id: row.get(2)?,
            status: RequestStatus::parse(&status).unwrap_or(RequestStatus::Pending),
            created_at: from_millis(row.get(4)?),
        })
    }

    /// Any record between the two identities, in either direction.
    pub fn find_between(&self, a: &str, b: &str) -> Result<Option<FriendRequestRecord>> {
        let conn = self.db.lock();
        conn.query_row(
            &format!(
                "SELECT {} FROM friend_requests
                 WHERE (requester_id = ?1 AND receiver_id = ?2)
                    OR (requester_id = ?2 AND receiver_id = ?1)",
                REQUEST_COLUMNS
            ),
            params![a, b],
            Self::row_to_record,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Insert a new pending request. The UNIQUE pair constraint backstops
    /// races that slip past the caller's bidirectional lookup.
    pub fn insert_pending(
        &self,
        requester_id: &str,
        receiver_id: &str,
    ) -> Result<FriendRequestRecord> {
        let record = FriendRequestRecord {
            id: Uuid::new_v4().to_string(),
            requester_id: requester_id.to_string(),
            receiver_id: receiver_id.to_string(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };

        let conn = self.db.lock();
        match conn.execute(
            "INSERT INTO friend_requests (id, requester_id, receiver_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.requester_id,
                record.receiver_id,
                record.status.as_str(),
                record.created_at.timestamp_millis()
            ],
        ) {
            Ok(_) => Ok(record),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict("Friend request already pending".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All pending requests addressed to `receiver_id`, newest first.
    pub fn pending_for_receiver(&self, receiver_id: &str) -> Result<Vec<FriendRequestRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM friend_requests
             WHERE receiver_id = ?1 AND status = 'pending'
             ORDER BY created_at DESC, rowid DESC",
            REQUEST_COLUMNS
        ))?;
        let rows = stmt.query_map(params![receiver_id], Self::row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// Conditionally flip a pending request to accepted. Returns false when
    /// no row matched — unknown id, wrong receiver, or already processed.
    pub fn accept(&self, request_id: &str, receiver_id: &str) -> Result<bool> {
        let conn = self.db.lock();
        let changed = conn.execute(
            "UPDATE friend_requests SET status = 'accepted'
             WHERE id = ?1 AND receiver_id = ?2 AND status = 'pending'",
            params![request_id, receiver_id],
        )?;
        Ok(changed == 1)
    }

    /// Conditionally delete a pending request (rejection). Same matching
    /// rules and false-on-no-match semantics as [`accept`](Self::accept).
    pub fn reject(&self, request_id: &str, receiver_id: &str) -> Result<bool> {
        let conn = self.db.lock();
        let deleted = conn.execute(
            "DELETE FROM friend_requests
             WHERE id = ?1 AND receiver_id = ?2 AND status = 'pending'",
            params![request_id, receiver_id],
        )?;
        Ok(deleted == 1)
    }

    /// All accepted relationships involving `user_id`, either direction.
    pub fn accepted_for_user(&self, user_id: &str) -> Result<Vec<FriendRequestRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM friend_requests
             WHERE status = 'accepted' AND (requester_id = ?1 OR receiver_id = ?1)
             ORDER BY created_at DESC, rowid DESC",
            REQUEST_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id], Self::row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// Delete the accepted record between the pair, either direction.
    /// Returns false if no friendship existed.
    pub fn remove_friendship(&self, a: &str, b: &str) -> Result<bool> {
        let conn = self.db.lock();
        let deleted = conn.execute(
            "DELETE FROM friend_requests
             WHERE status = 'accepted'
               AND ((requester_id = ?1 AND receiver_id = ?2)
                 OR (requester_id = ?2 AND receiver_id = ?1))",
            params![a, b],
        )?;
        Ok(deleted > 0)
    }
}
