use axum::{Json, response::IntoResponse};
use roulette_core::entities::RoundSource;
use roulette_core::processors::RoundRequest;
use roulette_sdk::objects::{RoundRunResponse, RunRoundRequest};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, pairing_to_response, round_to_response};

/// Turn an admin request into a manual round request.
pub(super) fn manual_request(body: RunRoundRequest) -> RoundRequest {
    RoundRequest {
        scheduled_date: body
            .scheduled_date
            .unwrap_or_else(|| time::OffsetDateTime::now_utc().date()),
        source: RoundSource::Manual,
        filter: body.filter,
        ignore_recent_history: body.ignore_recent_history,
        seed: body.seed,
    }
}

/// `POST /rounds` - run a matching round now.
///
/// Runs the same path as the cron trigger and waits for the round to commit.
/// Rejected with 409 while another round is in progress.
pub async fn run_round(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Json(body): Json<RunRoundRequest>,
) -> Result<impl IntoResponse, AdminApiError> {
    let report = state.coordinator.execute(manual_request(body)).await?;

    tracing::info!(
        round_id = %report.round.id,
        pairings = report.pairings.len(),
        "Manual round completed"
    );
    Ok(Json(RoundRunResponse {
        round: round_to_response(&report.round),
        pairings: report.pairings.iter().map(pairing_to_response).collect(),
        meetings_scheduled: report.meetings_scheduled,
        notifications_enqueued: report.notifications_enqueued,
    }))
}
