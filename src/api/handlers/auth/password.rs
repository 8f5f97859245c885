//! Password change and reset endpoints.
//!
//! `forgot-password` answers the same way whether or not the email is known. The reset token
//! is only ever handed to the mailer.

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
    types::{ChangePasswordRequest, ForgotPasswordRequest, ResetPasswordRequest},
    utils::{ClientIdentity, json_payload},
    validation::{validate_change_password, validate_forgot_password, validate_reset_password},
};
use crate::api::response::{
    ErrorBody, failure, internal_error, success_empty, validation_failed,
};
use crate::auth::{AuthError, Tier};

const RESET_REQUESTED: &str =
    "If an account exists for that email, password reset instructions have been sent";

#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Current password is incorrect", body = ErrorBody),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(response) = enforce(&auth_state, &client, &[Tier::Auth]) {
        return response;
    }
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    if let Err(response) = enforce(&auth_state, &client, &[Tier::Sensitive]) {
        return response;
    }

    let request: ChangePasswordRequest = match json_payload(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let errors = validate_change_password(&request);
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    match auth_state
        .service()
        .change_password(
            principal.user_id,
            request.current_password,
            request.new_password,
        )
        .await
    {
        Ok(()) => success_empty(StatusCode::OK, "Password changed successfully"),
        Err(AuthError::IncorrectPassword) => {
            failure(StatusCode::BAD_REQUEST, "Current password is incorrect")
        }
        Err(AuthError::UserNotFound) => failure(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to change password: {err}");
            internal_error()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Reset requested"),
        (status = 422, description = "Validation failed", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(response) = enforce(
        &auth_state,
        &client,
        &[Tier::Auth, Tier::Email, Tier::PasswordReset],
    ) {
        return response;
    }

    let request: ForgotPasswordRequest = match json_payload(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let errors = validate_forgot_password(&request);
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    match auth_state
        .service()
        .request_password_reset(&request.email)
        .await
    {
        Ok(Some(ticket)) => {
            // Delivery failures are logged only; the response stays the same.
            if let Err(err) = auth_state.mailer().send(&ticket) {
                error!("Failed to send password reset mail: {err}");
            }
        }
        Ok(None) => {}
        Err(err) => {
            error!("Failed to request password reset: {err}");
            return internal_error();
        }
    }

    success_empty(StatusCode::ACCEPTED, RESET_REQUESTED)
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Invalid or expired reset token", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(response) = enforce(&auth_state, &client, &[Tier::Auth, Tier::PasswordReset]) {
        return response;
    }

    let request: ResetPasswordRequest = match json_payload(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let errors = validate_reset_password(&request);
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    match auth_state
        .service()
        .reset_password(request.reset_token.trim(), request.new_password)
        .await
    {
        Ok(()) => success_empty(StatusCode::OK, "Password reset successfully"),
        Err(AuthError::InvalidToken) => {
            failure(StatusCode::BAD_REQUEST, "Invalid or expired reset token")
        }
        Err(err) => {
            error!("Failed to reset password: {err}");
            internal_error()
        }
    }
}
