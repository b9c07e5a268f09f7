//! Storage layer for finished walks.
//!
//! Provides local persistence for [`SessionRecord`]s using `rusqlite`.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. To hand it to the async finalizer, wrap it in [`SharedDatabase`],
//! which serializes access behind a mutex and implements
//! [`SessionStore`].
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC with millisecond precision
//! (e.g. `2024-05-01T09:00:00.000Z`), so lexicographic order matches
//! chronological order.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use thiserror::Error;
use walk_core::{SessionRecord, SessionStore, UserId, ValidationError};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp for walk {walk_id}: {timestamp}")]
    TimestampParse {
        walk_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row violates a domain invariant.
    #[error("invalid walk {walk_id}: {source}")]
    InvalidRow {
        walk_id: i64,
        #[source]
        source: ValidationError,
    },
    /// Another thread panicked while holding the connection.
    #[error("database lock poisoned")]
    Poisoned,
    /// The blocking task running a statement panicked or was cancelled.
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = match self.conn.path() {
            Some(path) if !path.is_empty() => path,
            _ => ":memory:",
        };
        f.debug_struct("Database").field("path", &path).finish()
    }
}

/// A walk as stored locally.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWalk {
    pub id: i64,
    pub record: SessionRecord,
}

/// Aggregate over all stored walks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WalkTotals {
    pub walks: u64,
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    pub calories: f64,
    pub last_ended_at: Option<DateTime<Utc>>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- One row per finalized walk. Rows are never updated.
            CREATE TABLE IF NOT EXISTS walks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                elapsed_seconds INTEGER NOT NULL,
                distance_meters REAL NOT NULL,
                calories REAL NOT NULL,
                average_speed REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_walks_started ON walks(started_at);
            CREATE INDEX IF NOT EXISTS idx_walks_user ON walks(user_id);
            ",
        )?;
        Ok(())
    }

    /// Stores a finished walk and returns its row ID.
    #[expect(
        clippy::cast_possible_wrap,
        reason = "elapsed seconds never approach i64::MAX"
    )]
    pub fn insert_walk(&self, record: &SessionRecord) -> Result<i64, DbError> {
        self.conn.execute(
            "
            INSERT INTO walks
            (user_id, started_at, ended_at, elapsed_seconds, distance_meters, calories, average_speed)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                record.user_id.as_str(),
                format_timestamp(record.started_at),
                format_timestamp(record.ended_at),
                record.elapsed_seconds as i64,
                record.distance_meters,
                record.calories,
                record.average_speed,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, user_id = %record.user_id, "stored walk");
        Ok(id)
    }

    /// Lists the most recent walks, newest first.
    pub fn list_walks(&self, limit: usize) -> Result<Vec<StoredWalk>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "
            SELECT id, user_id, started_at, ended_at, elapsed_seconds, distance_meters, calories, average_speed
            FROM walks
            ORDER BY started_at DESC, id DESC
            LIMIT ?
            ",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(WalkRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                started_at: row.get(2)?,
                ended_at: row.get(3)?,
                elapsed_seconds: row.get(4)?,
                distance_meters: row.get(5)?,
                calories: row.get(6)?,
                average_speed: row.get(7)?,
            })
        })?;
        let mut walks = Vec::new();
        for row in rows {
            walks.push(row?.into_stored()?);
        }
        Ok(walks)
    }

    /// Sums every stored walk.
    #[expect(
        clippy::cast_sign_loss,
        reason = "counts and elapsed sums are non-negative by construction"
    )]
    pub fn walk_totals(&self) -> Result<WalkTotals, DbError> {
        let (walks, elapsed, distance, calories, last): (i64, i64, f64, f64, Option<String>) =
            self.conn.query_row(
                "
                SELECT COUNT(*),
                       COALESCE(SUM(elapsed_seconds), 0),
                       COALESCE(SUM(distance_meters), 0.0),
                       COALESCE(SUM(calories), 0.0),
                       MAX(ended_at)
                FROM walks
                ",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;
        let last_ended_at = last
            .map(|ts| parse_timestamp(0, ts))
            .transpose()?;
        Ok(WalkTotals {
            walks: walks.max(0) as u64,
            elapsed_seconds: elapsed.max(0) as u64,
            distance_meters: distance,
            calories,
            last_ended_at,
        })
    }
}

/// Raw row, before validation.
struct WalkRow {
    id: i64,
    user_id: String,
    started_at: String,
    ended_at: String,
    elapsed_seconds: i64,
    distance_meters: f64,
    calories: f64,
    average_speed: f64,
}

impl WalkRow {
    #[expect(
        clippy::cast_sign_loss,
        reason = "negative values are clamped to zero first"
    )]
    fn into_stored(self) -> Result<StoredWalk, DbError> {
        let user_id = UserId::new(self.user_id).map_err(|source| DbError::InvalidRow {
            walk_id: self.id,
            source,
        })?;
        Ok(StoredWalk {
            id: self.id,
            record: SessionRecord {
                user_id,
                started_at: parse_timestamp(self.id, self.started_at)?,
                ended_at: parse_timestamp(self.id, self.ended_at)?,
                elapsed_seconds: self.elapsed_seconds.max(0) as u64,
                distance_meters: self.distance_meters,
                calories: self.calories,
                average_speed: self.average_speed,
            },
        })
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(walk_id: i64, timestamp: String) -> Result<DateTime<Utc>, DbError> {
    match DateTime::parse_from_rfc3339(&timestamp) {
        Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
        Err(source) => Err(DbError::TimestampParse {
            walk_id,
            timestamp,
            source,
        }),
    }
}

/// A [`Database`] that can be shared with the async finalizer.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl fmt::Debug for SharedDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("SharedDatabase");
        match self.inner.try_lock() {
            Ok(db) => debug.field("db", &*db),
            Err(_) => debug.field("db", &"<locked>"),
        };
        debug.finish()
    }
}

impl SharedDatabase {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Runs `f` with exclusive access to the database.
    pub fn with<T>(&self, f: impl FnOnce(&Database) -> Result<T, DbError>) -> Result<T, DbError> {
        let db = self.inner.lock().map_err(|_| DbError::Poisoned)?;
        f(&db)
    }
}

impl SessionStore for SharedDatabase {
    type Error = DbError;

    // SQLite I/O runs on the blocking pool, off the runtime's workers.
    async fn save(&self, record: &SessionRecord) -> Result<(), DbError> {
        let db = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || db.with(|db| db.insert_walk(&record))).await??;
        Ok(())
    }
}
