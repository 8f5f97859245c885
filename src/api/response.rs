//! Uniform JSON envelopes.
//!
//! Success: `{success: true, message, data, timestamp}`.
//! Failure: `{success: false, message, errors?, timestamp}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessBody<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    pub timestamp: String,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn success<T: Serialize>(status: StatusCode, message: &str, data: Option<T>) -> Response {
    let body = SuccessBody {
        success: true,
        message: message.to_string(),
        data,
        timestamp: timestamp(),
    };
    (status, Json(body)).into_response()
}

/// Success envelope with `data: null`.
pub fn success_empty(status: StatusCode, message: &str) -> Response {
    success::<()>(status, message, None)
}

pub fn failure(status: StatusCode, message: &str) -> Response {
    let body = ErrorBody {
        success: false,
        message: message.to_string(),
        errors: None,
        timestamp: timestamp(),
    };
    (status, Json(body)).into_response()
}

pub fn validation_failed(errors: Vec<FieldError>) -> Response {
    let body = ErrorBody {
        success: false,
        message: "Validation failed".to_string(),
        errors: Some(errors),
        timestamp: timestamp(),
    };
    (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
}

pub fn internal_error() -> Response {
    failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> anyhow::Result<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn success_envelope() -> anyhow::Result<()> {
        let response = success(StatusCode::CREATED, "Created", Some(vec![1, 2]));
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = body_json(response).await?;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Created");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert!(json["timestamp"].as_str().is_some_and(|ts| ts.ends_with('Z')));
        Ok(())
    }

    #[tokio::test]
    async fn empty_success_has_null_data() -> anyhow::Result<()> {
        let json = body_json(success_empty(StatusCode::OK, "Done")).await?;
        assert_eq!(json["data"], Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn failure_omits_errors() -> anyhow::Result<()> {
        let response = failure(StatusCode::UNAUTHORIZED, "Invalid token");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await?;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Invalid token");
        assert!(json.get("errors").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn validation_lists_field_errors() -> anyhow::Result<()> {
        let response = validation_failed(vec![FieldError::new("email", "Invalid email")]);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = body_json(response).await?;
        assert_eq!(json["message"], "Validation failed");
        assert_eq!(json["errors"][0]["field"], "email");
        Ok(())
    }

    #[tokio::test]
    async fn internal_error_is_generic() -> anyhow::Result<()> {
        let response = internal_error();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await?["message"], "Internal server error");
        Ok(())
    }
}
