//! Account registration.

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
    types::RegisterRequest,
    utils::{ClientIdentity, json_payload},
    validation::validate_register,
};
use crate::api::response::{ErrorBody, failure, internal_error, success, validation_failed};
use crate::auth::{AuthError, AuthSession, Registration, Role, Tier};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthSession),
        (status = 409, description = "Email already exists", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(response) = enforce(&auth_state, &client, &[Tier::Auth, Tier::Sensitive]) {
        return response;
    }

    let request: RegisterRequest = match json_payload(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let errors = validate_register(&request);
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    let registration = Registration {
        email: request.email,
        name: request.name.map(|name| name.trim().to_string()),
        password: request.password,
        role: request.role.as_deref().and_then(|role| role.parse::<Role>().ok()),
    };

    match auth_state.service().register(registration).await {
        Ok(session) => success(
            StatusCode::CREATED,
            "User registered successfully",
            Some(session),
        ),
        Err(AuthError::DuplicateEmail) => failure(StatusCode::CONFLICT, "Email already exists"),
        Err(err) => {
            error!("Failed to register user: {err}");
            internal_error()
        }
    }
}
