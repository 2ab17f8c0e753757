//! Meeting domain: records, the keyed end-lock, transcript deduplication
//! and the end-of-meeting orchestrator.

pub mod dedup;
pub mod end_machine;
pub mod lock;
pub mod record;

pub use end_machine::{EndMeetingMachine, EndOutcome, EndRejection, EndRequest};
pub use record::{
    MeetingRecord, MeetingStatus, ParticipantRecord, ParticipantRole, Summary, TranscriptEntry,
};
