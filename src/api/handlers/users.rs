//! Role-based user management endpoints.
//!
//! Flow:
//! 1) Count the request against the `api` tier.
//! 2) Authenticate the bearer token.
//! 3) Enforce the role required by the route.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::auth::{
    AuthState, ClientIdentity, Principal, rate_limit::enforce, require_auth, require_role,
};
use crate::api::response::{ErrorBody, failure, internal_error, success, success_empty};
use crate::auth::{PublicUser, Role, StoreError, Tier};

async fn authorize(
    headers: &HeaderMap,
    auth_state: &AuthState,
    client: &ClientIdentity,
    roles: &[Role],
) -> Result<Principal, Response> {
    enforce(auth_state, client, &[Tier::Api])?;
    let principal = require_auth(headers, auth_state).await?;
    require_role(&principal, roles)?;
    Ok(principal)
}

fn user_not_found() -> Response {
    failure(StatusCode::NOT_FOUND, "User not found")
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = [PublicUser]),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 403, description = "Insufficient permissions", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
) -> impl IntoResponse {
    if let Err(response) = authorize(&headers, &auth_state, &client, &[Role::Admin]).await {
        return response;
    }

    match auth_state.service().store().list().await {
        Ok(users) => {
            let users: Vec<PublicUser> = users.into_iter().map(|user| user.into_public()).collect();
            success(StatusCode::OK, "Users retrieved successfully", Some(users))
        }
        Err(err) => {
            error!("Failed to list users: {err}");
            internal_error()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = PublicUser),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
) -> impl IntoResponse {
    if let Err(response) =
        authorize(&headers, &auth_state, &client, &[Role::User, Role::Admin]).await
    {
        return response;
    }
    let Ok(id) = Uuid::parse_str(&id) else {
        return user_not_found();
    };

    match auth_state.service().store().find_by_id(id).await {
        Ok(Some(user)) => success(
            StatusCode::OK,
            "User retrieved successfully",
            Some(user.into_public()),
        ),
        Ok(None) => user_not_found(),
        Err(err) => {
            error!("Failed to load user: {err}");
            internal_error()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 403, description = "Insufficient permissions", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 429, description = "Rate limited")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    client: Extension<ClientIdentity>,
) -> impl IntoResponse {
    let principal = match authorize(&headers, &auth_state, &client, &[Role::Admin]).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let Ok(id) = Uuid::parse_str(&id) else {
        return user_not_found();
    };

    match auth_state.service().store().delete(id).await {
        Ok(()) => {
            info!(user_id = %id, admin_id = %principal.user_id, "User deleted");
            success_empty(StatusCode::OK, "User deleted successfully")
        }
        Err(StoreError::NotFound) => user_not_found(),
        Err(err) => {
            error!("Failed to delete user: {err}");
            internal_error()
        }
    }
}
