use axum::{Json, extract::Path, response::IntoResponse};
use kanau::processor::Processor;
use roulette_core::entities::matching_round::GetMatchingRoundById;
use roulette_core::entities::pairing::ListPairingsForRound;
use roulette_core::framework::DatabaseProcessor;
use roulette_sdk::objects::RoundDetailResponse;
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, pairing_to_response, round_to_response};

/// `GET /rounds/{round_id}` - a round with its pairings.
pub async fn get_round(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(round_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let processor = DatabaseProcessor {
        pool: state.store.pool().clone(),
    };

    let round = processor
        .process(GetMatchingRoundById { round_id })
        .await
        .map_err(AdminApiError::Database)?
        .ok_or(AdminApiError::NotFound)?;

    let pairings = processor
        .process(ListPairingsForRound { round_id })
        .await
        .map_err(AdminApiError::Database)?;

    Ok(Json(RoundDetailResponse {
        round: round_to_response(&round),
        pairings: pairings.iter().map(pairing_to_response).collect(),
    }))
}
