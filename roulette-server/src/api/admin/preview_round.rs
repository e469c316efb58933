use axum::{Json, response::IntoResponse};
use roulette_sdk::objects::{PreviewPairing, PreviewResponse, RunRoundRequest};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;
use super::run_round::manual_request;

/// `POST /rounds/preview` - compute pairings without persisting anything.
///
/// With the same `seed` and an unchanged snapshot, a following `POST /rounds`
/// produces the same pairs.
pub async fn preview_round(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Json(body): Json<RunRoundRequest>,
) -> Result<impl IntoResponse, AdminApiError> {
    let preview = state.coordinator.preview(manual_request(body)).await?;

    Ok(Json(PreviewResponse {
        eligible_count: preview.eligible_count,
        pairings: preview
            .pairs
            .iter()
            .map(|pair| PreviewPairing {
                participant_a: pair.first.id,
                participant_a_name: pair.first.display_name.clone(),
                participant_b: pair.second.id,
                participant_b_name: pair.second.display_name.clone(),
                score: pair.score,
            })
            .collect(),
        unpaired_participant_ids: preview.unpaired.iter().map(|c| c.id).collect(),
    }))
}
