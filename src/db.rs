//! Shared SQLite handle and schema.
//!
//! The connection is opened exactly once at startup, before the listener
//! binds, and shared via `Arc<Mutex<_>>` — there is no lazy connect path for
//! concurrent early callers to race on. Every store call locks, runs one
//! short synchronous statement, and unlocks; the guard is never held across
//! an await point.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

use crate::error::{Error, Result};

/// Database schema, applied idempotently at startup.
///
/// `friend_requests` carries the uniqueness constraint on the ordered pair;
/// together with the bidirectional lookup before insert and the self-request
/// check, this prevents duplicate relationships in either direction.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id    TEXT PRIMARY KEY,
    email      TEXT NOT NULL DEFAULT '',
    username   TEXT UNIQUE,
    name       TEXT NOT NULL DEFAULT '',
    picture    TEXT NOT NULL DEFAULT '',
    is_online  INTEGER NOT NULL DEFAULT 0,
    last_seen  INTEGER,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS friend_requests (
    id           TEXT PRIMARY KEY,
    requester_id TEXT NOT NULL,
    receiver_id  TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'pending',
    created_at   INTEGER NOT NULL,
    UNIQUE (requester_id, receiver_id)
);

CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver
    ON friend_requests (receiver_id, status);
CREATE INDEX IF NOT EXISTS idx_friend_requests_requester
    ON friend_requests (requester_id, status);
";

/// The shared database handle.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open or create the database file.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Unavailable(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    /// Create an in-memory database (used by tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Unavailable(format!("Failed to create in-memory database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Unavailable(format!("Failed to create tables: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for a short synchronous statement.
    /// Callers must not hold the guard across an await point.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// Millisecond timestamp → `DateTime<Utc>`, saturating on out-of-range input.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
