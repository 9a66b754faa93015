//! # Recording Store
//!
//! Key-value storage for recorded audio, grouped by category. The rest of the
//! crate only sees the [`RecordingStore`] trait; two implementations ship:
//!
//! - [`SqliteRecordingStore`]: one `recording` table in an SQLite file
//! - [`MemoryRecordingStore`]: a `Vec` for tests and throwaway sessions

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, trace};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{AffirmError, Result};
use crate::playlist::Track;

/// Prefix of track urls that point into the recording store.
pub const RECORDING_URL_PREFIX: &str = "recording:";

pub type RecordingId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub id: RecordingId,
    pub name: String,
    pub category: String,
    pub bytes: Vec<u8>,
    /// Seconds since the Unix epoch.
    pub created_at: i64,
}

impl Recording {
    /// Track url referring to this recording.
    #[must_use]
    pub fn url(&self) -> String {
        recording_url(self.id)
    }
}

#[must_use]
pub fn recording_url(id: RecordingId) -> String {
    format!("{RECORDING_URL_PREFIX}{id}")
}

/// Parse `recording:<id>` back into an id.
#[must_use]
pub fn parse_recording_url(url: &str) -> Option<RecordingId> {
    url.strip_prefix(RECORDING_URL_PREFIX)?.parse().ok()
}

/// Encoded audio behind a track: read from the store for `recording:` urls,
/// from the filesystem otherwise.
pub fn load_track_bytes(store: &dyn RecordingStore, track: &Track) -> Result<Vec<u8>> {
    match parse_recording_url(&track.url) {
        Some(id) => store
            .recording(id)?
            .map(|r| r.bytes)
            .ok_or_else(|| AffirmError::unavailable(format!("recording {id} no longer exists"))),
        None => Ok(std::fs::read(&track.url)?),
    }
}

pub trait RecordingStore {
    fn save_recording(&mut self, name: &str, bytes: &[u8], category: &str) -> Result<RecordingId>;

    fn recordings_by_category(&self, category: &str) -> Result<Vec<Recording>>;

    /// Distinct categories that hold at least one recording, sorted.
    fn all_categories(&self) -> Result<Vec<String>>;

    /// Deleting an unknown id is not an error.
    fn delete_recording(&mut self, id: RecordingId) -> Result<()>;

    fn recording(&self, id: RecordingId) -> Result<Option<Recording>>;
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// SQLite-backed store.
#[derive(Debug)]
pub struct SqliteRecordingStore {
    conn: Connection,
}

impl SqliteRecordingStore {
    /// Open (or create) the database file and make sure the table exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| AffirmError::storage(format!("cannot open {}: {e}", path.display())))?;
        debug!("Opened recording store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS recording (
                id         INTEGER PRIMARY KEY,
                name       TEXT    NOT NULL,
                category   TEXT    NOT NULL,
                bytes      BLOB    NOT NULL,
                created_at INTEGER NOT NULL
            )",
            (),
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_recording_category ON recording(category)",
            (),
        )?;
        Ok(Self { conn })
    }

    fn row_to_recording(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recording> {
        Ok(Recording {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            bytes: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl RecordingStore for SqliteRecordingStore {
    fn save_recording(&mut self, name: &str, bytes: &[u8], category: &str) -> Result<RecordingId> {
        self.conn.execute(
            "INSERT INTO recording (name, category, bytes, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, category, bytes, now_unix()],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Saved recording {id} `{name}' ({} bytes) in `{category}'", bytes.len());
        Ok(id)
    }

    fn recordings_by_category(&self, category: &str) -> Result<Vec<Recording>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category, bytes, created_at FROM recording WHERE category = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([category], Self::row_to_recording)?;

        let mut recordings = Vec::new();
        for recording in rows {
            recordings.push(recording?);
        }
        trace!("Found {} recordings in `{category}'", recordings.len());
        Ok(recordings)
    }

    fn all_categories(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT category FROM recording ORDER BY category")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(AffirmError::from)
    }

    fn delete_recording(&mut self, id: RecordingId) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM recording WHERE id = ?1", [id])?;
        debug!("Deleted {removed} recording(s) with id {id}");
        Ok(())
    }

    fn recording(&self, id: RecordingId) -> Result<Option<Recording>> {
        let recording = self
            .conn
            .query_row(
                "SELECT id, name, category, bytes, created_at FROM recording WHERE id = ?1",
                [id],
                Self::row_to_recording,
            )
            .optional()?;
        Ok(recording)
    }
}

/// Non-persistent store.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordingStore {
    recordings: Vec<Recording>,
    next_id: RecordingId,
}

impl MemoryRecordingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordingStore for MemoryRecordingStore {
    fn save_recording(&mut self, name: &str, bytes: &[u8], category: &str) -> Result<RecordingId> {
        self.next_id += 1;
        self.recordings.push(Recording {
            id: self.next_id,
            name: name.to_string(),
            category: category.to_string(),
            bytes: bytes.to_vec(),
            created_at: now_unix(),
        });
        Ok(self.next_id)
    }

    fn recordings_by_category(&self, category: &str) -> Result<Vec<Recording>> {
        Ok(self
            .recordings
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect())
    }

    fn all_categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> = self.recordings.iter().map(|r| r.category.clone()).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    fn delete_recording(&mut self, id: RecordingId) -> Result<()> {
        self.recordings.retain(|r| r.id != id);
        Ok(())
    }

    fn recording(&self, id: RecordingId) -> Result<Option<Recording>> {
        Ok(self.recordings.iter().find(|r| r.id == id).cloned())
    }
}
