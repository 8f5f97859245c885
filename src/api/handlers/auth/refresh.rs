//! Refresh-token exchange.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use super::{
    rate_limit::enforce,
    state::AuthState,
    types::RefreshTokenRequest,
    utils::{ClientIdentity, json_payload},
};
use crate::api::response::{ErrorBody, failure, internal_error, success};
use crate::auth::{AuthError, AuthSession, Tier};

#[utoipa::path(
    post,
    path = "/api/auth/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Token refreshed", body = AuthSession),
        (status = 400, description = "Refresh token is required", body = ErrorBody),
        (status = 401, description = "Invalid refresh token", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(response) = enforce(&auth_state, &client, &[Tier::Auth]) {
        return response;
    }

    let request: RefreshTokenRequest = match json_payload(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let token = request.refresh_token.trim();
    if token.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Refresh token is required");
    }

    match auth_state.service().refresh(token).await {
        Ok(session) => success(StatusCode::OK, "Token refreshed successfully", Some(session)),
        Err(AuthError::InvalidToken) => failure(StatusCode::UNAUTHORIZED, "Invalid refresh token"),
        Err(err) => {
            error!("Failed to refresh token: {err}");
            internal_error()
        }
    }
}
