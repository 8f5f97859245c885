//! HTTP side of rate limiting.
//!
//! Every request passes [`general_limit`], which also records the caller's
//! [`ClientIdentity`]. Handlers then apply their own tiers with [`enforce`].

use axum::{
    Json,
    extract::{ConnectInfo, Request},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{error, warn};

use super::{
    state::AuthState,
    utils::{ClientIdentity, client_identity},
};
use crate::api::response::internal_error;
use crate::auth::rate_limit::{RateLimitDecision, RateLimitRejection, RateLimitStatus, Tier};

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitBody {
    success: bool,
    message: &'static str,
    retry_after: &'static str,
    limit: u32,
    window_ms: u128,
}

fn ceil_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

fn insert_number(headers: &mut HeaderMap, name: HeaderName, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

/// Report the general tier on admitted responses unless a handler already reported a
/// stricter tier.
fn apply_status_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    if headers.contains_key(RATELIMIT_LIMIT) {
        return;
    }
    insert_number(headers, RATELIMIT_LIMIT, u64::from(status.limit));
    insert_number(headers, RATELIMIT_REMAINING, u64::from(status.remaining));
    insert_number(headers, RATELIMIT_RESET, ceil_seconds(status.reset_after));
}

/// 429 response for a rejected request.
pub(crate) fn too_many_requests(rejection: &RateLimitRejection) -> Response {
    let body = RateLimitBody {
        success: false,
        message: rejection.message,
        retry_after: rejection.retry_after,
        limit: rejection.limit,
        window_ms: rejection.window.as_millis(),
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();

    let reset = ceil_seconds(rejection.reset_after);
    let headers = response.headers_mut();
    insert_number(headers, RATELIMIT_LIMIT, u64::from(rejection.limit));
    insert_number(headers, RATELIMIT_REMAINING, 0);
    insert_number(headers, RATELIMIT_RESET, reset);
    insert_number(headers, axum::http::header::RETRY_AFTER, reset);
    response
}

/// Count the request against each tier in order. The first rejection wins.
///
/// # Errors
/// Returns the 429 response for the first tier that rejects.
pub(crate) fn enforce(
    state: &AuthState,
    client: &ClientIdentity,
    tiers: &[Tier],
) -> Result<(), Response> {
    for &tier in tiers {
        if let RateLimitDecision::Limited(rejection) =
            state.rate_limiter().check(tier, client.as_str())
        {
            warn!(tier = tier.as_str(), client = client.as_str(), "Request rate limited");
            return Err(too_many_requests(&rejection));
        }
    }
    Ok(())
}

/// Middleware applying the general tier to every request.
pub async fn general_limit(mut request: Request, next: Next) -> Response {
    let Some(state) = request.extensions().get::<Arc<AuthState>>().cloned() else {
        error!("Auth state missing from request extensions");
        return internal_error();
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_identity(
        request.headers(),
        peer,
        state.config().trust_proxy_headers(),
    );
    let decision = state.rate_limiter().check(Tier::General, client.as_str());
    request.extensions_mut().insert(client);

    match decision {
        RateLimitDecision::Limited(rejection) => too_many_requests(&rejection),
        RateLimitDecision::Allowed(status) => {
            let mut response = next.run(request).await;
            apply_status_headers(response.headers_mut(), &status);
            response
        }
        RateLimitDecision::Bypassed => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn rejection() -> RateLimitRejection {
        RateLimitRejection {
            tier: Tier::Auth,
            message: "Too many authentication attempts from this IP, please try again later.",
            retry_after: "15 minutes",
            limit: 5,
            window: Duration::from_secs(15 * 60),
            reset_after: Duration::from_millis(90_500),
        }
    }

    #[tokio::test]
    async fn rejection_body_and_headers() -> anyhow::Result<()> {
        let response = too_many_requests(&rejection());
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers.get("ratelimit-limit"), Some(&HeaderValue::from(5u64)));
        assert_eq!(headers.get("ratelimit-remaining"), Some(&HeaderValue::from(0u64)));
        assert_eq!(headers.get("retry-after"), Some(&HeaderValue::from(91u64)));

        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(json["success"], false);
        assert_eq!(json["retryAfter"], "15 minutes");
        assert_eq!(json["limit"], 5);
        assert_eq!(json["windowMs"], 900_000);
        Ok(())
    }

    #[test]
    fn seconds_round_up() {
        assert_eq!(ceil_seconds(Duration::from_secs(3)), 3);
        assert_eq!(ceil_seconds(Duration::from_millis(3_001)), 4);
        assert_eq!(ceil_seconds(Duration::ZERO), 0);
    }
}
