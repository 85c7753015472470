//! HTTP API handlers for studyhub-gw

pub mod chat;
pub mod documents;
pub mod health;
pub mod locale;
pub mod plan;
pub mod search;
pub mod sessions;
pub mod task;

pub use chat::chat_routes;
pub use documents::document_routes;
pub use health::health_routes;
pub use plan::plan_routes;
pub use search::search_routes;
pub use sessions::session_routes;
pub use task::task_routes;

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{relay_body, ApiError, ApiResult};
use crate::upstream::{UpstreamResponse, UpstreamStream};

/// Relay a 2xx upstream reply with its status and body unchanged
pub fn relay(response: UpstreamResponse) -> Response {
    relay_body(response.status, response.body)
}

/// Relay a 2xx upstream stream chunk by chunk
///
/// Keeps the upstream content type; a stream without one is treated as SSE.
pub fn relay_stream(stream: UpstreamStream) -> Response {
    let status = StatusCode::from_u16(stream.status).unwrap_or(StatusCode::OK);
    let content_type = stream
        .content_type
        .clone()
        .unwrap_or_else(|| "text/event-stream".to_string());
    let body = Body::from_stream(stream.into_byte_stream());

    (
        status,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        body,
    )
        .into_response()
}

/// Parse a request body that must be a JSON object
pub(crate) fn parse_json_object(body: &Bytes) -> ApiResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::BadRequest(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(ApiError::BadRequest(format!("Invalid JSON body: {}", e))),
    }
}

/// Decode a request body into `T`
///
/// Malformed JSON is a 400; JSON of the wrong shape is a 422.
pub(crate) fn decode_json_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        if e.is_data() {
            ApiError::Unprocessable(e.to_string())
        } else {
            ApiError::BadRequest(format!("Invalid JSON body: {}", e))
        }
    })
}

/// Required non-empty string field
pub(crate) fn required_string(map: &Map<String, Value>, field: &str) -> ApiResult<String> {
    match map.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(ApiError::BadRequest(format!(
            "{} is required and must be a non-empty string",
            field
        ))),
    }
}

/// Optional string field; non-string values count as absent
pub(crate) fn optional_string(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field).and_then(Value::as_str).map(str::to_string)
}
