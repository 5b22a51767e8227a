//! SQLite-backed store for sessions, streaks, tasks and notes.
//!
//! One `Database` wraps one connection. Several `Database` values (in one
//! process or many) may point at the same file; the schema's constraints and
//! conditional writes keep them consistent.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result};

/// Default file name inside the data directory.
pub const DB_FILE_NAME: &str = "focusroom.db";

pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the database at `~/.config/focusroom/focusroom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join(DB_FILE_NAME);
        Self::open_at(&path, Duration::from_secs(5))
    }

    /// Open (or create) the database file at `path`.
    ///
    /// `busy_timeout` bounds how long a write waits on another writer.
    pub fn open_at(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(busy_timeout)
            .map_err(DatabaseError::from)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// File backing this database; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Exclusive access to the connection for one statement sequence.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// === Column codecs ===
//
// Timestamps are stored as fixed-width RFC 3339 UTC strings with millisecond
// precision, so lexical order equals chronological order in SQL range scans.

pub(crate) fn encode_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn decode_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn decode_opt_ts(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| decode_ts(idx, &s)).transpose()
}

pub(crate) fn encode_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert!(encode_ts(early) < encode_ts(late));
        assert_eq!(encode_ts(late), "2026-01-10T00:00:00.000Z");
    }

    #[test]
    fn timestamp_codec_roundtrips() {
        let at = Utc.with_ymd_and_hms(2026, 7, 4, 8, 15, 30).unwrap();
        assert_eq!(decode_ts(0, &encode_ts(at)).unwrap(), at);
        assert!(decode_ts(0, "yesterday").is_err());
    }

    #[test]
    fn on_disk_database_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus.db");
        let db = Database::open_at(&path, Duration::from_millis(100)).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(Database::open_memory().unwrap().path().is_none());
    }
}
