//! Request helpers shared by the auth handlers.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::Response,
};
use std::net::SocketAddr;
use tracing::debug;

use crate::api::response::{FieldError, failure, validation_failed};

/// Client identity used as the rate-limit key, stored in request extensions by the
/// general limiter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Extract a client IP from common proxy headers.
pub(crate) fn extract_forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolve the client identity: the forwarded IP when proxy headers are trusted, else the
/// peer address.
pub(crate) fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> ClientIdentity {
    if trust_proxy_headers {
        if let Some(ip) = extract_forwarded_ip(headers) {
            return ClientIdentity(ip);
        }
    }
    ClientIdentity(peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string()))
}

/// Token from an `Authorization: Bearer <token>` header.
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub(crate) fn missing_payload() -> Response {
    failure(StatusCode::BAD_REQUEST, "Missing payload")
}

/// Unwrap a JSON body or answer with the error envelope.
///
/// - no JSON content type: 400 "Missing payload";
/// - well-formed JSON with a field of the wrong type: 422 "Validation failed";
/// - anything else the extractor rejects: its status with "Invalid JSON payload".
pub(crate) fn json_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match payload {
        Ok(Json(payload)) => Ok(payload),
        Err(JsonRejection::MissingJsonContentType(_)) => Err(missing_payload()),
        Err(JsonRejection::JsonDataError(err)) => {
            debug!("Rejected JSON body: {err}");
            Err(validation_failed(vec![data_error_field(&err.body_text())]))
        }
        Err(rejection) => {
            debug!("Rejected JSON body: {rejection}");
            Err(failure(rejection.status(), "Invalid JSON payload"))
        }
    }
}

/// Turn `"<prefix>: email: invalid type: ..."` into a field error for `email`.
fn data_error_field(body_text: &str) -> FieldError {
    let detail = body_text
        .split_once("target type: ")
        .map_or(body_text, |(_, detail)| detail);
    match detail.split_once(": ") {
        Some((field, message)) if !field.is_empty() && !field.contains(' ') => {
            FieldError::new(field, message)
        }
        _ => FieldError::new("body", detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        "192.0.2.10:51234".parse().ok()
    }

    #[test]
    fn forwarded_for_wins_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(
            client_identity(&headers, peer(), true),
            ClientIdentity("1.2.3.4".to_string())
        );
    }

    #[test]
    fn real_ip_is_the_fallback_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_forwarded_ip(&headers), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn proxy_headers_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        assert_eq!(
            client_identity(&headers, peer(), false).as_str(),
            "192.0.2.10"
        );
    }

    #[test]
    fn unknown_without_peer_or_headers() {
        let headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, None, true).as_str(), "unknown");
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn data_errors_name_the_offending_field() {
        let field = data_error_field(
            "Failed to deserialize the JSON body into the target type: email: invalid type: integer `5`, expected a string at line 1 column 11",
        );
        assert_eq!(field.field, "email");
        assert!(field.message.starts_with("invalid type: integer"));

        let field = data_error_field(
            "Failed to deserialize the JSON body into the target type: invalid type: string \"x\", expected struct LoginRequest",
        );
        assert_eq!(field.field, "body");
    }
}
