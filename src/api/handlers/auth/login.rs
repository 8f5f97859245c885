//! Email and password login.

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
    types::LoginRequest,
    utils::{ClientIdentity, json_payload},
    validation::validate_login,
};
use crate::api::response::{ErrorBody, failure, internal_error, success, validation_failed};
use crate::auth::{AuthError, AuthSession, Tier};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthSession),
        (status = 401, description = "Invalid email or password", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(response) = enforce(&auth_state, &client, &[Tier::Auth, Tier::Sensitive]) {
        return response;
    }

    let request: LoginRequest = match json_payload(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let errors = validate_login(&request);
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    // Unknown email and wrong password share one answer.
    match auth_state
        .service()
        .login(&request.email, request.password)
        .await
    {
        Ok(session) => success(StatusCode::OK, "Login successful", Some(session)),
        Err(AuthError::InvalidCredentials) => {
            failure(StatusCode::UNAUTHORIZED, "Invalid email or password")
        }
        Err(err) => {
            error!("Failed to log in: {err}");
            internal_error()
        }
    }
}
