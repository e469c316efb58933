use axum::{Json, extract::Path, response::IntoResponse};
use roulette_core::store::NotificationStore;
use roulette_sdk::objects::WelcomeResponse;
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /participants/{participant_id}/welcome` - queue the welcome
/// message for a participant who just opted in.
///
/// Called by the directory sync once it records the opt-in. Unknown
/// participants are 404.
pub async fn welcome_participant(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(participant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let recipient = state
        .store
        .recipient(participant_id)
        .await?
        .ok_or(AdminApiError::NotFound)?;

    let notifications_enqueued = state
        .queue
        .enqueue_welcome(
            recipient.id,
            &recipient.display_name,
            time::OffsetDateTime::now_utc(),
        )
        .await?;

    tracing::info!(participant_id = %recipient.id, "Welcome message queued");
    Ok(Json(WelcomeResponse {
        participant_id: recipient.id,
        notifications_enqueued,
    }))
}
