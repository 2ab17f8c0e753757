//! Meeting API endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting a meeting session (POST /meetings/:room_name/start)
//! - Ending a meeting session (POST /meetings/:room_name/end)
//! - Listing meetings (GET /meetings)
//! - Getting a specific meeting (GET /meetings/:id)

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::meeting::{
    EndMeetingMachine, EndRequest, MeetingRecord, ParticipantRecord, TranscriptEntry,
};
use crate::store::MeetingStore;

/// Shared state for meeting routes.
#[derive(Clone)]
pub struct MeetingApiState {
    pub machine: Arc<EndMeetingMachine>,
    pub store: Arc<dyn MeetingStore>,
}

/// Request body for the end endpoint. Accepts both snake_case and the
/// camelCase keys realtime clients send.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct EndMeetingRequest {
    #[serde(alias = "meetingId")]
    pub meeting_id: Option<String>,
    pub transcripts: Vec<TranscriptEntry>,
    pub participants: Vec<ParticipantRecord>,
    #[serde(alias = "endedAt")]
    pub ended_at: Option<DateTime<Utc>>,
    pub force: bool,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct StartMeetingRequest {
    pub participants: Vec<ParticipantRecord>,
}

pub fn router(state: MeetingApiState) -> Router {
    Router::new()
        .route("/meetings/:room_name/start", post(start_meeting))
        .route("/meetings/:room_name/end", post(end_meeting))
        .route("/meetings", get(list_meetings))
        .route("/meetings/:id", get(get_meeting))
        .with_state(state)
}

async fn start_meeting(
    Path(room_name): Path<String>,
    State(state): State<MeetingApiState>,
    body: Option<Json<StartMeetingRequest>>,
) -> ApiResult<Json<Value>> {
    if room_name.trim().is_empty() {
        return Err(ApiError::bad_request("Missing room name"));
    }

    let mut meeting = MeetingRecord::new(Uuid::new_v4().to_string(), room_name);
    if let Some(Json(req)) = body {
        meeting.participants = req.participants;
    }

    info!("Starting meeting {} in room {}", meeting.id, meeting.room_name);
    state
        .store
        .create_meeting(meeting.clone())
        .await
        .map_err(ApiError::from)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "meeting_id": meeting.id,
            "room_name": meeting.room_name,
            "status": meeting.status.as_str(),
            "started_at": meeting.started_at,
        },
    })))
}

async fn end_meeting(
    Path(room_name): Path<String>,
    State(state): State<MeetingApiState>,
    body: Option<Json<EndMeetingRequest>>,
) -> ApiResult<Json<Value>> {
    let Json(req) = body.unwrap_or_default();

    info!(
        "End signal for room {} (meeting {:?}, {} transcript entries)",
        room_name,
        req.meeting_id,
        req.transcripts.len()
    );

    let outcome = state
        .machine
        .end_meeting(EndRequest {
            meeting_id: req.meeting_id,
            room_name,
            transcripts: req.transcripts,
            participants: req.participants,
            ended_at: req.ended_at,
            force: req.force,
        })
        .await
        .map_err(ApiError::from)?;

    Ok(Json(json!({
        "success": true,
        "data": outcome,
    })))
}

async fn list_meetings(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<MeetingApiState>,
) -> ApiResult<Json<Value>> {
    let limit: usize = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);

    let meetings = state.store.list_meetings(limit).await.map_err(ApiError::from)?;

    let entries: Vec<Value> = meetings
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "room_name": m.room_name,
                "status": m.status.as_str(),
                "started_at": m.started_at,
                "ended_at": m.ended_at,
                "duration_minutes": m.duration_minutes,
                "participant_count": m.participants.len(),
                "has_summary": m.summary.is_some(),
            })
        })
        .collect();

    Ok(Json(json!({ "meetings": entries })))
}

async fn get_meeting(
    Path(id): Path<String>,
    State(state): State<MeetingApiState>,
) -> ApiResult<Json<Value>> {
    match state.store.get_meeting(&id).await.map_err(ApiError::from)? {
        Some(meeting) => Ok(Json(json!({ "meeting": meeting }))),
        None => Err(ApiError::not_found(format!("Meeting {} not found", id))),
    }
}
