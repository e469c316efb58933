use axum::{Json, response::IntoResponse};
use roulette_sdk::objects::RecoverStaleRoundsResponse;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /rounds/recover-stale` - fail rounds a crashed process left
/// `in_progress`.
///
/// Only rounds older than the stale threshold are touched, so a round that
/// is genuinely running is left alone.
pub async fn recover_stale_rounds(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> Result<impl IntoResponse, AdminApiError> {
    let failed_round_ids = state
        .coordinator
        .recover_stale_rounds(time::OffsetDateTime::now_utc())
        .await?;

    tracing::info!(count = failed_round_ids.len(), "Stale round recovery requested");
    Ok(Json(RecoverStaleRoundsResponse { failed_round_ids }))
}
