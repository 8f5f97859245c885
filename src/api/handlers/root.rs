//! Service banner served at `/`.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;

use super::auth::AuthState;
use crate::api::response::success;

#[derive(Debug, Serialize)]
struct Endpoints {
    auth: &'static str,
    users: &'static str,
    health: &'static str,
    openapi: &'static str,
}

#[derive(Debug, Serialize)]
struct Banner {
    name: &'static str,
    version: &'static str,
    environment: String,
    endpoints: Endpoints,
}

pub async fn root(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let banner = Banner {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        environment: auth_state.config().environment().to_string(),
        endpoints: Endpoints {
            auth: "/api/auth",
            users: "/api/users",
            health: "/health",
            openapi: "/openapi.json",
        },
    };
    success(StatusCode::OK, "Credo API is running", Some(banner))
}
