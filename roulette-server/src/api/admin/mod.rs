//! Admin API handlers.
//!
//! These endpoints are called by operators and require the
//! `Roulette-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `POST /rounds`                             – run a round now
//! - `POST /rounds/preview`                     – dry-run the matching, nothing persisted
//! - `POST /rounds/recover-stale`               – fail rounds abandoned in `in_progress`
//! - `GET  /rounds/{round_id}`                  – a round and its pairings
//! - `GET  /notifications/failed`               – permanently failed notifications
//! - `POST /notifications/{task_id}/requeue`    – reset a failed notification to pending
//! - `POST /participants/{participant_id}/welcome` – queue the opt-in welcome message

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use roulette_core::entities::matching_round::MatchingRound;
use roulette_core::entities::notification_task::NotificationTask;
use roulette_core::entities::pairing::Pairing;
use roulette_core::processors::RoundError;
use roulette_core::store::StoreError;
use roulette_sdk::objects::{NotificationTaskResponse, PairingResponse, RoundResponse};

use crate::state::AppState;

mod get_round;
mod list_failed_notifications;
mod preview_round;
mod recover_stale_rounds;
mod requeue_notification;
mod run_round;
mod welcome_participant;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rounds", post(run_round::run_round))
        .route("/rounds/preview", post(preview_round::preview_round))
        .route(
            "/rounds/recover-stale",
            post(recover_stale_rounds::recover_stale_rounds),
        )
        .route("/rounds/{round_id}", get(get_round::get_round))
        .route(
            "/notifications/failed",
            get(list_failed_notifications::list_failed_notifications),
        )
        .route(
            "/notifications/{task_id}/requeue",
            post(requeue_notification::requeue_notification),
        )
        .route(
            "/participants/{participant_id}/welcome",
            post(welcome_participant::welcome_participant),
        )
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Database(sqlx::Error),
    Store(StoreError),
    Round(RoundError),
    NotFound,
}

impl From<StoreError> for AdminApiError {
    fn from(e: StoreError) -> Self {
        AdminApiError::Store(e)
    }
}

impl From<RoundError> for AdminApiError {
    fn from(e: RoundError) -> Self {
        AdminApiError::Round(e)
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Database(e) => {
                tracing::error!(error = %e, "Admin API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::Store(e) => {
                tracing::error!(error = %e, "Admin API store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::Round(e @ RoundError::InsufficientParticipants { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()
            }
            AdminApiError::Round(e @ RoundError::RoundInProgress) => {
                (StatusCode::CONFLICT, e.to_string()).into_response()
            }
            AdminApiError::Round(e) => {
                tracing::error!(round_id = ?e.round_id(), error = %e, "Admin API round error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

pub(crate) fn round_to_response(r: &MatchingRound) -> RoundResponse {
    RoundResponse {
        round_id: r.id,
        scheduled_date: r.scheduled_date,
        executed_at: r.executed_at.map(|t| t.unix_timestamp()),
        status: r.status.into(),
        source: r.source.into(),
        participant_count: r.participant_count,
        pairing_count: r.pairing_count,
        unpaired_participant_ids: r.unpaired_participant_ids.clone(),
        ignore_recent_history: r.ignore_recent_history,
        error_message: r.error_message.clone(),
    }
}

pub(crate) fn pairing_to_response(p: &Pairing) -> PairingResponse {
    PairingResponse {
        pairing_id: p.id,
        participant_a: p.participant_a,
        participant_b: p.participant_b,
        status: p.status.into(),
        score: p.score,
        meeting_scheduled_at: p.meeting_scheduled_at.map(|t| t.unix_timestamp()),
    }
}

pub(crate) fn task_to_response(t: &NotificationTask) -> NotificationTaskResponse {
    NotificationTaskResponse {
        task_id: t.id,
        round_id: t.round_id,
        pairing_id: t.pairing_id,
        recipient_id: t.recipient_id,
        notification_type: t.notification_type.into(),
        channel: t.channel.into(),
        status: t.status.into(),
        scheduled_for: t.scheduled_for.unix_timestamp(),
        sent_at: t.sent_at.map(|at| at.unix_timestamp()),
        retry_count: t.retry_count,
        error_message: t.error_message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roulette_core::entities::{RoundSource, RoundStatus};
    use roulette_sdk::objects::RoundStatus as SdkRoundStatus;
    use time::macros::{date, datetime};
    use uuid::Uuid;

    #[test]
    fn test_round_errors_map_to_status_codes() {
        let cases = [
            (
                AdminApiError::Round(RoundError::InsufficientParticipants {
                    round_id: None,
                    eligible: 1,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AdminApiError::Round(RoundError::RoundInProgress),
                StatusCode::CONFLICT,
            ),
            (
                AdminApiError::Round(RoundError::Aborted {
                    round_id: Uuid::from_u128(1),
                    source: StoreError::Backend("boom".into()),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AdminApiError::NotFound, StatusCode::NOT_FOUND),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_round_to_response() {
        let round = MatchingRound {
            id: Uuid::from_u128(7),
            scheduled_date: date!(2026 - 03 - 02),
            executed_at: Some(datetime!(2026-03-02 09:00 UTC)),
            status: RoundStatus::Completed,
            source: RoundSource::Manual,
            participant_count: 7,
            pairing_count: 3,
            filter: None,
            ignore_recent_history: false,
            unpaired_participant_ids: vec![Uuid::from_u128(4)],
            error_message: None,
            created_at: datetime!(2026-03-02 09:00 UTC),
        };
        let response = round_to_response(&round);
        assert_eq!(response.status, SdkRoundStatus::Completed);
        assert_eq!(response.executed_at, Some(1_772_442_000));
        assert_eq!(response.unpaired_participant_ids, vec![Uuid::from_u128(4)]);
    }
}
