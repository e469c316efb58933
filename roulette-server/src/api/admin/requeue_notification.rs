use axum::{Json, extract::Path, response::IntoResponse};
use roulette_core::store::NotificationStore;
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, task_to_response};

/// `POST /notifications/{task_id}/requeue` - give a failed notification a
/// fresh set of attempts.
///
/// Only `failed` tasks can be requeued; anything else is 404. The task is
/// due immediately, so the dispatcher picks it up on its next pass.
pub async fn requeue_notification(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let task = state
        .store
        .requeue(task_id, time::OffsetDateTime::now_utc())
        .await?
        .ok_or(AdminApiError::NotFound)?;

    tracing::info!(task_id = %task.id, "Failed notification requeued");
    Ok(Json(task_to_response(&task)))
}
