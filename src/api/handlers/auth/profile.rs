//! The authenticated user's own profile.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use super::{
    principal::require_auth,
    rate_limit::enforce,
    state::AuthState,
    types::UpdateProfileRequest,
    utils::{ClientIdentity, json_payload},
    validation::validate_profile_update,
};
use crate::api::response::{ErrorBody, failure, internal_error, success, validation_failed};
use crate::auth::{AuthError, ProfileUpdate, PublicUser, Tier};

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "Profile retrieved", body = PublicUser),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn get_profile(
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

    match auth_state.service().profile(principal.user_id).await {
        Ok(user) => success(StatusCode::OK, "Profile retrieved successfully", Some(user)),
        Err(AuthError::UserNotFound) => failure(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to load profile: {err}");
            internal_error()
        }
    }
}

/// Update `name` and `email`. `password`, `role` and `id` in the body are ignored.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = PublicUser),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 409, description = "Email already exists", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn update_profile(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(response) = enforce(&auth_state, &client, &[Tier::Auth]) {
        return response;
    }
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let update: ProfileUpdate = match json_payload(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let errors = validate_profile_update(&UpdateProfileRequest {
        name: update.name.clone(),
        email: update.email.clone(),
    });
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    match auth_state
        .service()
        .update_profile(principal.user_id, update)
        .await
    {
        Ok(user) => success(StatusCode::OK, "Profile updated successfully", Some(user)),
        Err(AuthError::DuplicateEmail) => failure(StatusCode::CONFLICT, "Email already exists"),
        Err(AuthError::UserNotFound) => failure(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to update profile: {err}");
            internal_error()
        }
    }
}
