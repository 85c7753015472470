//! Video and image search proxies
//!
//! Both validate the keyword locally, then relay whatever the external
//! service answers, status and body included.

use axum::{body::Bytes, extract::State, response::Response, routing::post, Router};
use serde_json::json;
use tracing::info;

use crate::api::{optional_string, parse_json_object, relay, required_string};
use crate::error::ApiResult;
use crate::upstream::{UpstreamClient, UpstreamError};
use crate::AppState;

const VIDEO_SEARCH_PATH: &str = "/api/video/search";
const IMAGE_SEARCH_PATH: &str = "/api/image/search";

/// POST /api/video/search
///
/// `lang` is forwarded only when the caller sent one.
pub async fn video_search(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = parse_json_object(&body)?;
    let search_keyword = required_string(&request, "search_keyword")?;
    let lang = optional_string(&request, "lang");

    info!(keyword = %search_keyword, lang = ?lang, "Video search");

    let payload = match lang {
        Some(lang) => json!({ "search_keyword": search_keyword, "lang": lang }),
        None => json!({ "search_keyword": search_keyword }),
    };
    forward(&state.upstream, VIDEO_SEARCH_PATH, payload).await
}

/// POST /api/image/search
pub async fn image_search(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = parse_json_object(&body)?;
    let search_keyword = required_string(&request, "search_keyword")?;
    let lang = optional_string(&request, "lang").unwrap_or_else(|| "en".to_string());

    info!(keyword = %search_keyword, lang = %lang, "Image search");

    let payload = json!({ "search_keyword": search_keyword, "lang": lang });
    forward(&state.upstream, IMAGE_SEARCH_PATH, payload).await
}

async fn forward(
    upstream: &UpstreamClient,
    path: &str,
    payload: serde_json::Value,
) -> ApiResult<Response> {
    match upstream.post_json(path, &payload).await {
        Ok(response) => Ok(relay(response)),
        Err(UpstreamError::Status { status, body }) => Ok(crate::error::relay_body(status, body)),
        Err(e) => Err(e.into()),
    }
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route(VIDEO_SEARCH_PATH, post(video_search))
        .route(IMAGE_SEARCH_PATH, post(image_search))
}
