//! Meeting persistence.
//!
//! The engine consumes storage through the `MeetingStore` trait so test
//! doubles can stand in for the real database. The shipped implementation
//! is raw SQL over rusqlite, no ORM; owned collections (participants,
//! transcripts, summary) are JSON text columns.

pub mod meetings;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::meeting::record::{
    MeetingRecord, MeetingStatus, ParticipantRecord, Summary, TranscriptEntry,
};

pub use meetings::MeetingRepository;

/// Final snapshot written by the single atomic end transition.
#[derive(Debug, Clone)]
pub struct EndPatch {
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub participants: Vec<ParticipantRecord>,
    pub transcripts: Vec<TranscriptEntry>,
}

/// Post-transition mutation: status advance and/or summary attachment.
#[derive(Debug, Clone, Default)]
pub struct MeetingPatch {
    pub status: Option<MeetingStatus>,
    pub summary: Option<Summary>,
}

#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn get_meeting(&self, id: &str) -> Result<Option<MeetingRecord>>;
    async fn find_active_meeting(&self, room_name: &str) -> Result<Option<MeetingRecord>>;
    async fn create_meeting(&self, meeting: MeetingRecord) -> Result<()>;
    /// Compare-and-set end transition. Returns the updated record when this
    /// caller won the transition, `None` when another writer already
    /// transitioned the meeting.
    async fn atomic_meeting_end(&self, id: &str, patch: EndPatch) -> Result<Option<MeetingRecord>>;
    async fn update_meeting(&self, id: &str, patch: MeetingPatch) -> Result<MeetingRecord>;
    async fn delete_meeting(&self, id: &str) -> Result<bool>;
    async fn list_meetings(&self, limit: usize) -> Result<Vec<MeetingRecord>>;
}

pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings (
            id TEXT PRIMARY KEY,
            room_name TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            duration_minutes INTEGER NOT NULL DEFAULT 0,
            participants TEXT NOT NULL,
            transcripts TEXT NOT NULL,
            summary TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create meetings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_room_status ON meetings(room_name, status)",
        [],
    )
    .context("Failed to create index on room_name/status")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_started_at ON meetings(started_at DESC)",
        [],
    )
    .context("Failed to create index on started_at")?;

    Ok(())
}

/// Store backed by a sqlite file. Opens a connection per operation and runs
/// it on the blocking pool, so async callers never hold a connection across
/// an await point.
pub struct SqliteMeetingStore {
    db_path: PathBuf,
}

impl SqliteMeetingStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = open_db(&db_path)?;
            op(&conn)
        })
        .await
        .context("Database task panicked")?
    }
}

#[async_trait]
impl MeetingStore for SqliteMeetingStore {
    async fn get_meeting(&self, id: &str) -> Result<Option<MeetingRecord>> {
        let id = id.to_owned();
        self.with_conn(move |conn| MeetingRepository::get(conn, &id)).await
    }

    async fn find_active_meeting(&self, room_name: &str) -> Result<Option<MeetingRecord>> {
        let room_name = room_name.to_owned();
        self.with_conn(move |conn| MeetingRepository::find_active(conn, &room_name))
            .await
    }

    async fn create_meeting(&self, meeting: MeetingRecord) -> Result<()> {
        self.with_conn(move |conn| MeetingRepository::insert(conn, &meeting))
            .await
    }

    async fn atomic_meeting_end(&self, id: &str, patch: EndPatch) -> Result<Option<MeetingRecord>> {
        let id = id.to_owned();
        self.with_conn(move |conn| MeetingRepository::atomic_end(conn, &id, &patch))
            .await
    }

    async fn update_meeting(&self, id: &str, patch: MeetingPatch) -> Result<MeetingRecord> {
        let id = id.to_owned();
        self.with_conn(move |conn| MeetingRepository::update(conn, &id, &patch))
            .await
    }

    async fn delete_meeting(&self, id: &str) -> Result<bool> {
        let id = id.to_owned();
        self.with_conn(move |conn| MeetingRepository::delete(conn, &id)).await
    }

    async fn list_meetings(&self, limit: usize) -> Result<Vec<MeetingRecord>> {
        self.with_conn(move |conn| MeetingRepository::list(conn, limit))
            .await
    }
}
