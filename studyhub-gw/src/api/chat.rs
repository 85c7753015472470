//! Tutor chat proxies: follow-up question suggestions and the streaming chat
//!
//! Suggestions degrade gracefully: when the external service cannot answer,
//! the caller still gets a 200 with a fixed set of generic questions.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::locale::request_lang;
use crate::api::{optional_string, parse_json_object, relay, relay_stream};
use crate::error::{ApiError, ApiResult};
use crate::upstream::{RequestBody, UpstreamError};
use crate::AppState;

const SUGGEST_QUESTIONS_PATH: &str = "/api/ai/suggest_questions";
const CHAT_STREAM_PATH: &str = "/api/chat1/stream";

const FALLBACK_QUESTIONS_ZH: [&str; 3] = [
    "这个概念的核心要点是什么？",
    "能否提供一个具体的例子？",
    "这与其他相关概念有什么区别？",
];

const FALLBACK_QUESTIONS_EN: [&str; 3] = [
    "What are the key points of this concept?",
    "Could you give a concrete example?",
    "How does this differ from related concepts?",
];

/// POST /api/ai/suggest_questions
///
/// The body is forwarded unchanged. A missing upstream configuration is
/// still a 500; every other failure, including a 2xx reply that is not JSON,
/// answers 200 with `success: false` and the fallback questions.
pub async fn suggest_questions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let request = parse_json_object(&body)?;
    let lang = request_lang(optional_string(&request, "lang").as_deref(), &headers);

    info!(
        task_title = ?request.get("task_title"),
        has_submission = request.contains_key("user_submission"),
        "Suggesting follow-up questions"
    );

    let err = match state
        .upstream
        .post_json(SUGGEST_QUESTIONS_PATH, &Value::Object(request))
        .await
    {
        Ok(response) if response.body.json().is_some() => return Ok(relay(response)),
        Ok(_) => UpstreamError::Decode("expected JSON, got non-JSON body".to_string()),
        Err(UpstreamError::Configuration) => return Err(ApiError::Configuration),
        Err(e) => e,
    };

    warn!(error = %err, lang = %lang, "Suggest questions failed, using fallback questions");
    Ok(Json(fallback_suggestions(&lang, &err)).into_response())
}

fn fallback_suggestions(lang: &str, err: &UpstreamError) -> Value {
    let questions = if lang.starts_with("zh") {
        FALLBACK_QUESTIONS_ZH
    } else {
        FALLBACK_QUESTIONS_EN
    };
    json!({
        "success": false,
        "error": "External suggest questions API call failed",
        "message": err.to_string(),
        "questions": questions,
    })
}

/// POST /api/chat1/stream
///
/// Forwards the conversation and streams the reply back as it is produced.
pub async fn chat_stream(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = parse_json_object(&body)?;
    info!(fields = request.len(), "Opening chat stream");

    let stream = state
        .upstream
        .send_streaming(
            Method::POST,
            CHAT_STREAM_PATH,
            RequestBody::Json(Value::Object(request)),
        )
        .await?;
    Ok(relay_stream(stream))
}

/// Build chat routes
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route(SUGGEST_QUESTIONS_PATH, post(suggest_questions))
        .route(CHAT_STREAM_PATH, post(chat_stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_follows_lang() {
        let err = UpstreamError::Transport("refused".to_string());

        let zh = fallback_suggestions("zh", &err);
        assert_eq!(zh["success"], false);
        assert_eq!(zh["questions"][0], FALLBACK_QUESTIONS_ZH[0]);

        let en = fallback_suggestions("en", &err);
        assert_eq!(en["questions"].as_array().unwrap().len(), 3);
        assert_eq!(en["questions"][2], FALLBACK_QUESTIONS_EN[2]);
    }
}
