//! Bearer-token authentication and role checks for protected routes.

use axum::{http::HeaderMap, http::StatusCode, response::Response};
use tracing::{debug, error};
use uuid::Uuid;

use super::{state::AuthState, utils::extract_bearer_token};
use crate::api::response::failure;
use crate::auth::{Role, TokenError, TokenKind};

/// The authenticated caller, rebuilt from the store on every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

/// Authenticate the request from its `Authorization: Bearer` header.
///
/// # Errors
/// Returns the ready-to-send 401/500 response when authentication fails.
pub async fn require_auth(headers: &HeaderMap, state: &AuthState) -> Result<Principal, Response> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(failure(StatusCode::UNAUTHORIZED, "Access token is required"));
    };

    let claims = match state
        .service()
        .tokens()
        .verify(&token, TokenKind::Access)
    {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            return Err(failure(StatusCode::UNAUTHORIZED, "Token expired"));
        }
        Err(TokenError::Encoding) => {
            error!("Access token verification failed unexpectedly");
            return Err(failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication error",
            ));
        }
        Err(err) => {
            debug!("Access token rejected: {err}");
            return Err(failure(StatusCode::UNAUTHORIZED, "Invalid token"));
        }
    };

    match state.service().store().find_by_id(claims.sub).await {
        Ok(Some(user)) => Ok(Principal {
            user_id: user.id,
            email: user.email,
            role: user.role,
        }),
        Ok(None) => {
            debug!(user_id = %claims.sub, "Access token for missing user");
            Err(failure(StatusCode::UNAUTHORIZED, "Invalid token"))
        }
        Err(err) => {
            error!("Failed to load user for access token: {err}");
            Err(failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication error",
            ))
        }
    }
}

/// # Errors
/// Returns a 403 response when the principal holds none of `roles`.
pub fn require_role(principal: &Principal, roles: &[Role]) -> Result<(), Response> {
    if principal.has_role(roles) {
        Ok(())
    } else {
        debug!(user_id = %principal.user_id, role = %principal.role, "Role check failed");
        Err(failure(StatusCode::FORBIDDEN, "Insufficient permissions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_membership() {
        let principal = Principal {
            user_id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            role: Role::User,
        };
        assert!(require_role(&principal, &[Role::User, Role::Admin]).is_ok());

        let denied = require_role(&principal, &[Role::Admin]);
        assert!(matches!(denied, Err(ref response) if response.status() == StatusCode::FORBIDDEN));
    }
}
