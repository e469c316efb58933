//! Payloads exchanged with the calendar relay that books pairing meetings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signature::Signature;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingAttendee {
    pub participant_id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
}

/// Body of a meeting booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingBookingRequest {
    pub pairing_id: Uuid,
    pub attendees: [MeetingAttendee; 2],
    pub icebreakers: Vec<String>,
}

impl Signature for MeetingBookingRequest {}

/// Answer of the calendar relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MeetingBookingResponse {
    Scheduled {
        /// Unix timestamp (seconds).
        scheduled_at: i64,
        event_ref: String,
    },
    NoCommonAvailability,
}
