//! Meeting record types shared across the store, pipeline and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a meeting. Status only ever moves forward along
/// this order; it never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Active,
    Ending,
    Ended,
    Processing,
    Completed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Ended => "ended",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "ending" => Ok(Self::Ending),
            "ended" => Ok(Self::Ended),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            _ => anyhow::bail!("Invalid meeting status: {}", s),
        }
    }

    /// True once the end transition has been claimed. Repeated end signals
    /// for a meeting in one of these states are duplicates.
    pub fn is_end_settled(&self) -> bool {
        matches!(self, Self::Ended | Self::Processing | Self::Completed)
    }

    fn order_index(&self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Ending => 1,
            Self::Ended => 2,
            Self::Processing => 3,
            Self::Completed => 4,
        }
    }

    pub fn can_advance_to(&self, next: MeetingStatus) -> bool {
        next.order_index() > self.order_index()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Host,
    Participant,
}

/// One speech-to-text fragment. Never mutated outside the deduplicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, alias = "participantId", skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: ParticipantRole,
    #[serde(alias = "joinedAt")]
    pub joined_at: DateTime<Utc>,
    #[serde(default, alias = "leftAt", skip_serializing_if = "Option::is_none")]
    pub left_at: Option<DateTime<Utc>>,
}

/// Structured meeting summary. Created once per meeting, immutable after
/// creation; regeneration is not supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub content: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub decisions: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Durable record of one meeting session. Owns its participants and
/// transcript entries by composition; belongs to a room by name only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: String,
    pub room_name: String,
    pub status: MeetingStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    pub participants: Vec<ParticipantRecord>,
    pub transcripts: Vec<TranscriptEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

impl MeetingRecord {
    pub fn new(id: String, room_name: String) -> Self {
        Self {
            id,
            room_name,
            status: MeetingStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            duration_minutes: 0,
            participants: Vec::new(),
            transcripts: Vec::new(),
            summary: None,
        }
    }
}
