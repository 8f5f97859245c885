use crate::{
    api::handlers::{
        auth::{self, general_limit},
        health, root,
    },
    auth::{PgCredentialStore, rate_limit::spawn_pruner, store::apply_schema},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, options},
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod email;
pub mod handlers;
mod openapi;
pub mod response;

pub use email::{LogPasswordResetMailer, PasswordResetMailer};
pub use openapi::openapi;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented routes, `/`, `/openapi.json` and the layer
/// stack (request ids, tracing, CORS, auth state, general rate limit).
#[must_use]
pub fn app(auth_state: Arc<auth::AuthState>, cors: CorsLayer) -> Router {
    let (router, spec) = router().split_for_parts();
    router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .route(
            "/openapi.json",
            get(move || {
                let spec = spec.clone();
                async move { Json(spec) }
            }),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(middleware::from_fn(general_limit)),
        )
}

/// CORS for the configured origin, or any origin when none is set.
///
/// # Errors
/// Returns an error if `origin` is not an absolute URL with a host.
pub fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);
    match origin {
        Some(origin) => Ok(cors
            .allow_origin(AllowOrigin::exact(exact_origin(origin)?))
            .allow_credentials(true)),
        None => Ok(cors.allow_origin(Any)),
    }
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: auth::AuthConfig,
    cors_origin: Option<String>,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    apply_schema(&pool).await?;

    let auth_state = Arc::new(auth::AuthState::from_config(
        auth_config,
        Arc::new(PgCredentialStore::new(pool)),
        Arc::new(LogPasswordResetMailer),
    )?);
    info!(
        environment = %auth_state.config().environment(),
        "Auth state ready"
    );

    let pruner = spawn_pruner(auth_state.rate_limiter_handle(), PRUNE_INTERVAL);

    let app = app(auth_state, cors_layer(cors_origin.as_deref())?);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
        }
        info!("Gracefully shutdown");
    })
    .await?;

    pruner.abort();

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn exact_origin(origin: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(origin).with_context(|| format!("Invalid CORS origin: {origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {origin}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    HeaderValue::from_str(&format!("{}://{}{}", parsed.scheme(), host, port))
        .context("Failed to build CORS origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_origin_drops_path() -> Result<()> {
        assert_eq!(
            exact_origin("https://app.credo.dev:8443/login")?,
            HeaderValue::from_static("https://app.credo.dev:8443")
        );
        assert!(exact_origin("not a url").is_err());
        Ok(())
    }

    #[test]
    fn cors_layer_accepts_missing_origin() {
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("http://localhost:3000")).is_ok());
    }
}
