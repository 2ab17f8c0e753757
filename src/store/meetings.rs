//! Meeting record persistence.
//!
//! CRUD plus the compare-and-set end transition, raw SQL with rusqlite.
//! Participants, transcripts and the summary are stored as JSON text.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{EndPatch, MeetingPatch};
use crate::meeting::record::{MeetingRecord, MeetingStatus};

const SELECT_COLUMNS: &str = "id, room_name, status, started_at, ended_at, duration_minutes, \
     participants, transcripts, summary";

/// Repository for meeting records.
pub struct MeetingRepository;

impl MeetingRepository {
    pub fn insert(conn: &Connection, meeting: &MeetingRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO meetings (id, room_name, status, started_at, ended_at, \
             duration_minutes, participants, transcripts, summary) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                meeting.id,
                meeting.room_name,
                meeting.status.as_str(),
                meeting.started_at.to_rfc3339(),
                meeting.ended_at.map(|t| t.to_rfc3339()),
                meeting.duration_minutes,
                serde_json::to_string(&meeting.participants)?,
                serde_json::to_string(&meeting.transcripts)?,
                meeting
                    .summary
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
            ],
        )
        .context("Failed to insert meeting")?;
        Ok(())
    }

    pub fn get(conn: &Connection, id: &str) -> Result<Option<MeetingRecord>> {
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM meetings WHERE id = ?1"),
                params![id],
                raw_row,
            )
            .optional()
            .context("Failed to query meeting")?;

        row.map(RawMeetingRow::into_record).transpose()
    }

    /// The newest meeting in a room that has not yet settled its end
    /// transition. Used when an end signal carries no meeting id.
    pub fn find_active(conn: &Connection, room_name: &str) -> Result<Option<MeetingRecord>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM meetings \
                     WHERE room_name = ?1 AND status IN ('active', 'ending') \
                     ORDER BY started_at DESC LIMIT 1"
                ),
                params![room_name],
                raw_row,
            )
            .optional()
            .context("Failed to query active meeting")?;

        row.map(RawMeetingRow::into_record).transpose()
    }

    /// Compare-and-set end transition. The write no-ops when another writer
    /// already moved the meeting past `ending`; in that case `None` is
    /// returned and the record is left untouched.
    pub fn atomic_end(
        conn: &Connection,
        id: &str,
        patch: &EndPatch,
    ) -> Result<Option<MeetingRecord>> {
        let rows = conn
            .execute(
                "UPDATE meetings SET status = 'ended', ended_at = ?1, duration_minutes = ?2, \
                 participants = ?3, transcripts = ?4 \
                 WHERE id = ?5 AND status IN ('active', 'ending')",
                params![
                    patch.ended_at.to_rfc3339(),
                    patch.duration_minutes,
                    serde_json::to_string(&patch.participants)?,
                    serde_json::to_string(&patch.transcripts)?,
                    id,
                ],
            )
            .context("Failed to write meeting end transition")?;

        if rows == 0 {
            return Ok(None);
        }
        Self::get(conn, id)
    }

    pub fn update(conn: &Connection, id: &str, patch: &MeetingPatch) -> Result<MeetingRecord> {
        let Some(current) = Self::get(conn, id)? else {
            bail!("Meeting {} not found", id);
        };

        if let Some(next) = patch.status {
            if !current.status.can_advance_to(next) {
                bail!(
                    "Meeting {} status cannot move from {} to {}",
                    id,
                    current.status.as_str(),
                    next.as_str()
                );
            }
            conn.execute(
                "UPDATE meetings SET status = ?1 WHERE id = ?2",
                params![next.as_str(), id],
            )
            .context("Failed to update meeting status")?;
        }

        if let Some(summary) = &patch.summary {
            // Summaries are write-once; regeneration is not supported.
            if current.summary.is_some() {
                bail!("Meeting {} already has a summary", id);
            }
            conn.execute(
                "UPDATE meetings SET summary = ?1 WHERE id = ?2",
                params![serde_json::to_string(summary)?, id],
            )
            .context("Failed to attach meeting summary")?;
        }

        match Self::get(conn, id)? {
            Some(updated) => Ok(updated),
            None => bail!("Meeting {} disappeared during update", id),
        }
    }

    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let rows = conn
            .execute("DELETE FROM meetings WHERE id = ?1", params![id])
            .context("Failed to delete meeting")?;
        Ok(rows > 0)
    }

    /// List meetings, newest first.
    pub fn list(conn: &Connection, limit: usize) -> Result<Vec<MeetingRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM meetings \
                 ORDER BY started_at DESC, id DESC LIMIT ?1"
            ))
            .context("Failed to prepare meetings list query")?;

        let rows = stmt
            .query_map(params![limit as i64], raw_row)
            .context("Failed to list meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?.into_record()?);
        }
        Ok(meetings)
    }
}

/// Row as stored: strings and JSON blobs, decoded outside the rusqlite
/// closure so decoding errors surface as anyhow errors.
struct RawMeetingRow {
    id: String,
    room_name: String,
    status: String,
    started_at: String,
    ended_at: Option<String>,
    duration_minutes: i64,
    participants: String,
    transcripts: String,
    summary: Option<String>,
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawMeetingRow> {
    Ok(RawMeetingRow {
        id: row.get(0)?,
        room_name: row.get(1)?,
        status: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        duration_minutes: row.get(5)?,
        participants: row.get(6)?,
        transcripts: row.get(7)?,
        summary: row.get(8)?,
    })
}

impl RawMeetingRow {
    fn into_record(self) -> Result<MeetingRecord> {
        Ok(MeetingRecord {
            status: MeetingStatus::from_str(&self.status)?,
            started_at: parse_timestamp(&self.started_at)?,
            ended_at: self.ended_at.as_deref().map(parse_timestamp).transpose()?,
            duration_minutes: self.duration_minutes,
            participants: serde_json::from_str(&self.participants)
                .context("Failed to decode participants column")?,
            transcripts: serde_json::from_str(&self.transcripts)
                .context("Failed to decode transcripts column")?,
            summary: self
                .summary
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("Failed to decode summary column")?,
            id: self.id,
            room_name: self.room_name,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp in meetings table: {}", raw))?
        .with_timezone(&Utc))
}
