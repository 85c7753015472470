//! Document upload pass-through

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use reqwest::Method;
use serde_json::json;
use tracing::{error, info};

use crate::api::relay;
use crate::error::{ApiError, ApiResult};
use crate::upstream::{RequestBody, UpstreamError};
use crate::AppState;

const UPLOAD_PATH: &str = "/api/documents/upload";

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// POST /api/documents/upload
///
/// The multipart body goes upstream byte-for-byte with its original
/// `Content-Type`, so the boundary survives. Only the strict
/// `EXTERNAL_API_URL` base is used.
pub async fn upload_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    if !state.document_upstream.is_configured() {
        error!("Document upload requested but EXTERNAL_API_URL is not set");
        return Err(ApiError::Configuration);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| ct.to_ascii_lowercase().starts_with("multipart/"))
        .ok_or_else(|| ApiError::BadRequest("Expected a multipart/form-data body".to_string()))?
        .to_string();

    info!(bytes = body.len(), "Forwarding document upload");

    let result = state
        .document_upstream
        .send(
            Method::POST,
            UPLOAD_PATH,
            RequestBody::Multipart {
                content_type,
                bytes: body,
            },
        )
        .await;

    match result {
        Ok(response) => Ok(relay(response)),
        Err(UpstreamError::Status { status, body }) => {
            error!(status, body = %body, "Document upload rejected by external service");
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            Ok((status, Json(json!({ "error": "Upload failed" }))).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Build document routes
pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route(UPLOAD_PATH, post(upload_document))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
