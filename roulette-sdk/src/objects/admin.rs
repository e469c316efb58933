//! Admin API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{
    NotificationChannel, NotificationStatus, NotificationType, PairingStatus, RoundSource,
    RoundStatus, SeniorityLevel,
};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Restricts the eligible pool of a manually triggered round.
///
/// Every non-empty list narrows the pool; empty lists impose no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantFilter {
    #[serde(default)]
    pub department_ids: Vec<Uuid>,
    #[serde(default)]
    pub seniority_levels: Vec<SeniorityLevel>,
    #[serde(default)]
    pub participant_ids: Vec<Uuid>,
}

impl ParticipantFilter {
    pub fn is_empty(&self) -> bool {
        self.department_ids.is_empty()
            && self.seniority_levels.is_empty()
            && self.participant_ids.is_empty()
    }
}

/// Body of `POST /admin/rounds` and `POST /admin/rounds/preview`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRoundRequest {
    /// Defaults to today (UTC) when omitted.
    #[serde(default)]
    pub scheduled_date: Option<time::Date>,
    #[serde(default)]
    pub filter: Option<ParticipantFilter>,
    #[serde(default)]
    pub ignore_recent_history: bool,
    /// Fixes the shuffle so the same snapshot yields the same pairs.
    #[serde(default)]
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResponse {
    pub round_id: Uuid,
    pub scheduled_date: time::Date,
    pub executed_at: Option<i64>,
    pub status: RoundStatus,
    pub source: RoundSource,
    pub participant_count: i32,
    pub pairing_count: i32,
    pub unpaired_participant_ids: Vec<Uuid>,
    pub ignore_recent_history: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingResponse {
    pub pairing_id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub status: PairingStatus,
    pub score: i64,
    pub meeting_scheduled_at: Option<i64>,
}

/// A stored round and its pairings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundDetailResponse {
    pub round: RoundResponse,
    pub pairings: Vec<PairingResponse>,
}

/// Result of a committed round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRunResponse {
    pub round: RoundResponse,
    pub pairings: Vec<PairingResponse>,
    pub meetings_scheduled: usize,
    pub notifications_enqueued: usize,
}

/// A pairing proposed by a dry run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewPairing {
    pub participant_a: Uuid,
    pub participant_a_name: String,
    pub participant_b: Uuid,
    pub participant_b_name: String,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub eligible_count: usize,
    pub pairings: Vec<PreviewPairing>,
    pub unpaired_participant_ids: Vec<Uuid>,
}

/// Rounds that were stuck `in_progress` and have been failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverStaleRoundsResponse {
    pub failed_round_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub participant_id: Uuid,
    pub notifications_enqueued: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTaskResponse {
    pub task_id: Uuid,
    pub round_id: Option<Uuid>,
    pub pairing_id: Option<Uuid>,
    pub recipient_id: Uuid,
    pub notification_type: NotificationType,
    pub channel: NotificationChannel,
    pub status: NotificationStatus,
    pub scheduled_for: i64,
    pub sent_at: Option<i64>,
    pub retry_count: i32,
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 200;
const MAX_OFFSET: i64 = 100_000;

/// Query parameters for listing permanently failed notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct ListFailedNotificationsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Clamp limit and offset to safe maximums.
pub fn clamp_pagination(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_LIMIT), offset.clamp(0, MAX_OFFSET))
}
