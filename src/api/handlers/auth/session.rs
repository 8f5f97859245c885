//! Logout.
//!
//! Tokens are stateless and stay valid until they expire; clients discard them on logout.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::info;

use super::{
    principal::require_auth, rate_limit::enforce, state::AuthState, utils::ClientIdentity,
};
use crate::api::response::{ErrorBody, success_empty};
use crate::auth::Tier;

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
) -> impl IntoResponse {
    if let Err(response) = enforce(&auth_state, &client, &[Tier::Auth]) {
        return response;
    }
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    info!(user_id = %principal.user_id, "User logged out");
    success_empty(StatusCode::OK, "Logged out successfully")
}
