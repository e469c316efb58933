use axum::{Json, extract::Query, response::IntoResponse};
use roulette_core::store::NotificationStore;
use roulette_sdk::objects::{ListFailedNotificationsQuery, clamp_pagination};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, task_to_response};

/// `GET /notifications/failed` - permanently failed notifications, newest first.
pub async fn list_failed_notifications(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<ListFailedNotificationsQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);

    let tasks = state.store.list_failed(limit, offset).await?;

    let response: Vec<_> = tasks.iter().map(task_to_response).collect();
    Ok(Json(response))
}
