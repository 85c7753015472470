//! Error types for studyhub-gw
//!
//! Gateway-originated errors use the `{"error": {"code", "message"}}` body.
//! Upstream non-2xx replies are the exception: their status and body are
//! relayed unchanged.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::sessions::SessionError;
use crate::upstream::{UpstreamBody, UpstreamError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Well-formed but semantically invalid payload (422)
    #[error("Unprocessable payload: {0}")]
    Unprocessable(String),

    /// Conflict (409), e.g. session id already in progress
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing upstream configuration (500)
    #[error("External API URL not configured")]
    Configuration,

    /// Upstream unreachable or replied with garbage (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Upstream non-2xx, relayed as-is
    #[error("Upstream returned status {status}")]
    Upstream { status: u16, body: UpstreamBody },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Upstream { status, body } => return relay_body(status, body),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE", msg)
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Configuration => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIGURATION_ERROR",
                "External API URL not configured".to_string(),
            ),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Build a response from an upstream status and body
///
/// Both variants keep the upstream bytes; JSON goes out as
/// `application/json`, anything else as `text/plain`.
pub fn relay_body(status: u16, body: UpstreamBody) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    match body {
        UpstreamBody::Structured { raw, .. } => {
            (status, [(header::CONTENT_TYPE, "application/json")], raw).into_response()
        }
        UpstreamBody::Opaque(text) => (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Configuration => ApiError::Configuration,
            UpstreamError::Status { status, body } => ApiError::Upstream { status, body },
            UpstreamError::Transport(detail) => {
                error!(error = %detail, "Upstream unreachable");
                ApiError::BadGateway("External service unavailable".to_string())
            }
            UpstreamError::Decode(detail) => {
                error!(error = %detail, "Upstream reply did not match the expected shape");
                ApiError::BadGateway("Malformed response from external service".to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidId => ApiError::BadRequest(err.to_string()),
            SessionError::NotFound(_) => ApiError::NotFound(err.to_string()),
            SessionError::Conflict(_) | SessionError::InvalidTransition { .. } => {
                ApiError::Conflict(err.to_string())
            }
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionStatus;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unprocessable("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::Configuration, StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::BadGateway("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_upstream_status_is_preserved() {
        let err = ApiError::from(UpstreamError::Status {
            status: 418,
            body: UpstreamBody::Opaque("teapot".to_string()),
        });
        let response = err.into_response();
        assert_eq!(response.status().as_u16(), 418);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_structured_relay_keeps_upstream_bytes() {
        let raw = r#"{"results":[],"keyword":"recursion"}"#;
        let response = relay_body(200, UpstreamBody::from_text(raw.to_string()));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], raw.as_bytes());
    }

    #[test]
    fn test_transport_detail_is_not_exposed() {
        let err = ApiError::from(UpstreamError::Transport("dns failure for 10.0.0.7".into()));
        match err {
            ApiError::BadGateway(msg) => assert!(!msg.contains("10.0.0.7")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_session_errors() {
        assert!(matches!(
            ApiError::from(SessionError::NotFound("s".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(SessionError::InvalidTransition {
                id: "s".into(),
                from: SessionStatus::Failed,
                to: SessionStatus::Completed,
            }),
            ApiError::Conflict(_)
        ));
    }
}
