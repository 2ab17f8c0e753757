//! End-of-meeting orchestrator.
//!
//! Drives the full teardown pipeline:
//! lock → idempotency guard → atomic end transition → cleanup →
//! summarize → notify → final commit.
//!
//! All dependencies are injected via constructor — no concrete types
//! hardcoded, no singletons.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::notify::{real_recipients, SummaryMailer};
use crate::presence::RoomPresence;
use crate::store::{EndPatch, MeetingPatch, MeetingStore};
use crate::summary::{SummaryInput, SummaryPipeline};

use super::dedup::dedup_transcripts;
use super::lock::KeyedLock;
use super::record::{MeetingRecord, MeetingStatus, ParticipantRecord, TranscriptEntry};

const REASON_NO_CONTENT: &str = "no_meaningful_content";
const REASON_PARTICIPANTS_PRESENT: &str = "participants_present";

/// Rejections the caller is responsible for. Everything else that escapes
/// the engine is a persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum EndRejection {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
}

/// An end-of-meeting signal, validated at the API boundary.
#[derive(Debug)]
pub struct EndRequest {
    pub meeting_id: Option<String>,
    pub room_name: String,
    pub transcripts: Vec<TranscriptEntry>,
    pub participants: Vec<ParticipantRecord>,
    pub ended_at: Option<DateTime<Utc>>,
    pub force: bool,
}

/// Verdict returned for every end signal, duplicates included. Cloned to
/// callers that attached to an in-flight request for the same meeting.
#[derive(Debug, Clone, Serialize)]
pub struct EndOutcome {
    pub meeting_id: String,
    pub status: String,
    pub ended: bool,
    pub duplicate: bool,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub summary_generated: bool,
    pub emails_sent: usize,
    pub emails_failed: usize,
}

impl EndOutcome {
    fn duplicate_of(meeting: &MeetingRecord) -> Self {
        Self {
            meeting_id: meeting.id.clone(),
            status: meeting.status.as_str().to_string(),
            ended: true,
            duplicate: true,
            deleted: false,
            reason: None,
            summary_generated: meeting.summary.is_some(),
            emails_sent: 0,
            emails_failed: 0,
        }
    }
}

pub struct EndMeetingMachine {
    store: Arc<dyn MeetingStore>,
    pipeline: SummaryPipeline,
    mailer: Arc<dyn SummaryMailer>,
    presence: Arc<dyn RoomPresence>,
    locks: KeyedLock<EndOutcome>,
}

impl EndMeetingMachine {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        pipeline: SummaryPipeline,
        mailer: Arc<dyn SummaryMailer>,
        presence: Arc<dyn RoomPresence>,
    ) -> Self {
        Self {
            store,
            pipeline,
            mailer,
            presence,
            locks: KeyedLock::new(),
        }
    }

    /// Handle one end signal. Concurrent signals for the same meeting are
    /// serialized by the keyed lock; a signal arriving while another is in
    /// flight receives that request's result instead of starting its own
    /// pipeline.
    pub async fn end_meeting(&self, req: EndRequest) -> Result<EndOutcome> {
        if req.room_name.trim().is_empty() {
            return Err(EndRejection::Validation("Missing room name".to_string()).into());
        }

        let meeting_id = match &req.meeting_id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            Some(_) => {
                return Err(EndRejection::Validation("Empty meeting id".to_string()).into());
            }
            None => self
                .store
                .find_active_meeting(&req.room_name)
                .await?
                .map(|m| m.id)
                .ok_or_else(|| {
                    EndRejection::NotFound(format!(
                        "No active meeting in room {}",
                        req.room_name
                    ))
                })?,
        };

        self.locks
            .with_lock(&meeting_id, || self.end_locked(meeting_id.clone(), req))
            .await
    }

    async fn end_locked(&self, id: String, req: EndRequest) -> Result<EndOutcome> {
        let Some(meeting) = self.store.get_meeting(&id).await? else {
            return Err(EndRejection::NotFound(format!("Meeting {} not found", id)).into());
        };

        if meeting.room_name != req.room_name {
            return Err(EndRejection::Validation(format!(
                "Meeting {} does not belong to room {}",
                id, req.room_name
            ))
            .into());
        }

        // Idempotency guard: a repeated end signal is acknowledged with the
        // persisted state and performs no further work.
        if meeting.status.is_end_settled() {
            info!(
                "Meeting {} already {} — treating end signal as duplicate",
                id,
                meeting.status.as_str()
            );
            return Ok(EndOutcome::duplicate_of(&meeting));
        }

        if !req.force {
            match self.presence.participant_count(&meeting.room_name).await {
                Ok(live) if live > 0 => {
                    info!(
                        "Room {} still has {} live participant(s); declining end",
                        meeting.room_name, live
                    );
                    return Ok(EndOutcome {
                        meeting_id: id,
                        status: meeting.status.as_str().to_string(),
                        ended: false,
                        duplicate: false,
                        deleted: false,
                        reason: Some(REASON_PARTICIPANTS_PRESENT.to_string()),
                        summary_generated: false,
                        emails_sent: 0,
                        emails_failed: 0,
                    });
                }
                Ok(_) => {}
                // A dead presence service must not wedge meeting end.
                Err(e) => warn!("Presence check failed, assuming empty room: {:#}", e),
            }
        }

        let participants = if req.participants.is_empty() {
            meeting.participants.clone()
        } else {
            req.participants
        };

        let mut combined = meeting.transcripts.clone();
        combined.extend(req.transcripts);
        let transcripts = dedup_transcripts(&combined);

        let ended_at = req.ended_at.unwrap_or_else(Utc::now);
        let duration_minutes = (ended_at - meeting.started_at).num_minutes().max(0);

        // Single atomic transition; only one writer wins it.
        let ended = self
            .store
            .atomic_meeting_end(
                &id,
                EndPatch {
                    ended_at,
                    duration_minutes,
                    participants: participants.clone(),
                    transcripts: transcripts.clone(),
                },
            )
            .await?;

        let Some(_ended) = ended else {
            // An out-of-band writer beat us between the read and the write.
            return match self.store.get_meeting(&id).await? {
                Some(current) => Ok(EndOutcome::duplicate_of(&current)),
                None => Ok(EndOutcome {
                    meeting_id: id,
                    status: "deleted".to_string(),
                    ended: true,
                    duplicate: true,
                    deleted: true,
                    reason: Some(REASON_NO_CONTENT.to_string()),
                    summary_generated: false,
                    emails_sent: 0,
                    emails_failed: 0,
                }),
            };
        };

        // Cleanup policy: a meeting that produced nothing is deleted
        // instead of persisted as an empty husk.
        if transcripts.is_empty() && participants.len() <= 1 {
            self.store.delete_meeting(&id).await?;
            info!("Meeting {} had no meaningful content; deleted", id);
            return Ok(EndOutcome {
                meeting_id: id,
                status: "deleted".to_string(),
                ended: true,
                duplicate: false,
                deleted: true,
                reason: Some(REASON_NO_CONTENT.to_string()),
                summary_generated: false,
                emails_sent: 0,
                emails_failed: 0,
            });
        }

        self.store
            .update_meeting(
                &id,
                MeetingPatch {
                    status: Some(MeetingStatus::Processing),
                    summary: None,
                },
            )
            .await?;

        let summary = self
            .pipeline
            .generate(&SummaryInput {
                transcripts: &transcripts,
                participants: &participants,
                meeting_type: &meeting.room_name,
            })
            .await;

        let completed = self
            .store
            .update_meeting(
                &id,
                MeetingPatch {
                    status: Some(MeetingStatus::Completed),
                    summary: Some(summary.clone()),
                },
            )
            .await?;

        let recipients = real_recipients(&completed.participants);
        let report = self
            .mailer
            .send_summary(&meeting.room_name, &summary, &recipients)
            .await;
        if !report.failed_to.is_empty() {
            warn!(
                "Meeting {}: {} summary email(s) failed",
                id,
                report.failed_to.len()
            );
        }

        info!(
            "Meeting {} ended: {} min, {} transcript entries, {} email(s) sent",
            id,
            duration_minutes,
            transcripts.len(),
            report.sent_to.len()
        );

        Ok(EndOutcome {
            meeting_id: id,
            status: MeetingStatus::Completed.as_str().to_string(),
            ended: true,
            duplicate: false,
            deleted: false,
            reason: None,
            summary_generated: true,
            emails_sent: report.sent_to.len(),
            emails_failed: report.failed_to.len(),
        })
    }
}
