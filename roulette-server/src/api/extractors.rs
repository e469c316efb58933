//! Custom Axum extractors for request authentication.
//!
//! Provides `AdminAuth`, which checks the `Roulette-Admin-Authorization`
//! header against the argon2 hash of the configured admin secret.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use roulette_sdk::signature::ADMIN_AUTH_HEADER;

use crate::state::AppState;

/// Proof that the request carried the admin secret.
///
/// # Header format
///
/// ```text
/// Roulette-Admin-Authorization: {plaintext admin secret}
/// ```
pub struct AdminAuth;

#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("missing Roulette-Admin-Authorization header")]
    MissingHeader,
    #[error("invalid Roulette-Admin-Authorization header")]
    InvalidHeader,
    #[error("admin secret mismatch")]
    Unauthorized,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminAuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "missing Roulette-Admin-Authorization header",
            ),
            AdminAuthError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "invalid Roulette-Admin-Authorization header",
            ),
            AdminAuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidHeader)?;

        let admin = state.config.admin.read().await;
        if !admin.verify_secret(secret) {
            drop(admin);
            tracing::warn!("Rejected admin request with wrong secret");
            return Err(AdminAuthError::Unauthorized);
        }

        drop(admin);
        Ok(AdminAuth)
    }
}
