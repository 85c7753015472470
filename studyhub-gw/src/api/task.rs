//! Task generation and revision proxies

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Response,
    routing::post,
    Json, Router,
};
use serde_json::{Map, Value};
use studyhub_common::models::{TaskGenerateRequest, TaskGenerateResponse};
use tracing::{info, warn};

use crate::api::locale::request_lang;
use crate::api::{decode_json_body, optional_string, parse_json_object, relay};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const TASK_GENERATE_PATH: &str = "/api/task/generate";
const TASK_DETECT_PATH: &str = "/api/task/update/detect";
const TASK_EXECUTE_PATH: &str = "/api/task/update/execute";
const TASK_EVALUATE_PATH: &str = "/api/task/evaluate";

/// Animation hint sent with every generation request ("none")
const NO_ANIMATION: &str = "无";

/// POST /api/task/generate
///
/// Fills in `lang` from the request locale and disables animation, then
/// forwards the request. The reply must be a well-formed
/// `TaskGenerateResponse`; anything else is a 502.
pub async fn generate_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<TaskGenerateResponse>> {
    let mut request: TaskGenerateRequest = decode_json_body(&body)?;
    request.lang = Some(request_lang(request.lang.as_deref(), &headers));
    request.animation_type = NO_ANIMATION.to_string();

    info!(
        step = request.step,
        title = %request.title,
        work_type = request.work_type.as_str(),
        lang = ?request.lang,
        "Generating task"
    );

    let upstream = &state.upstream;
    let payload = &request;
    let response = state
        .retry
        .run(move || upstream.post_json(TASK_GENERATE_PATH, payload))
        .await?;

    let generated: TaskGenerateResponse = response.decode()?;
    if generated.task.work_type() != request.work_type {
        warn!(
            requested = request.work_type.as_str(),
            received = generated.task.work_type().as_str(),
            "External service generated a different task type"
        );
    }

    info!(
        step = request.step,
        success = generated.success,
        work_type = generated.task.work_type().as_str(),
        "Task generated"
    );

    Ok(Json(generated))
}

/// POST /api/task/update/detect
pub async fn detect_task_update(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Response> {
    let request = parse_json_object(&body)?;
    let payload = revision_payload(&request, "user_message")?;
    info!(chat_id = ?request.get("chat_id"), "Detecting task update intent");

    let response = state.upstream.post_json(TASK_DETECT_PATH, &payload).await?;
    Ok(relay(response))
}

/// POST /api/task/update/execute
pub async fn execute_task_update(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Response> {
    let request = parse_json_object(&body)?;
    let payload = revision_payload(&request, "suggestion")?;
    info!(chat_id = ?request.get("chat_id"), "Executing task update");

    let response = state.upstream.post_json(TASK_EXECUTE_PATH, &payload).await?;
    Ok(relay(response))
}

/// POST /api/task/evaluate
///
/// Forwards the submission with `lang` resolved from the request locale and
/// `id` set (null when the caller sent none); the verdict is relayed as-is.
pub async fn evaluate_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let mut request = parse_json_object(&body)?;
    let lang = request_lang(optional_string(&request, "lang").as_deref(), &headers);
    request.insert("lang".to_string(), Value::String(lang));
    request.entry("id").or_insert(Value::Null);

    info!(
        task_type = ?request.get("task_type"),
        has_task_data = request.contains_key("task_data"),
        lang = ?request.get("lang"),
        "Evaluating task submission"
    );

    let response = state
        .upstream
        .post_json(TASK_EVALUATE_PATH, &Value::Object(request))
        .await?;
    Ok(relay(response))
}

/// Pick the forwarded fields of a revision request
///
/// `task_data` must be an object; `message_field`, `lang` and `chat_id` are
/// forwarded when present.
fn revision_payload(request: &Map<String, Value>, message_field: &str) -> ApiResult<Value> {
    let task_data = match request.get("task_data") {
        Some(data @ Value::Object(_)) => data.clone(),
        _ => {
            return Err(ApiError::BadRequest(
                "task_data is required and must be an object".to_string(),
            ))
        }
    };

    let mut payload = Map::new();
    payload.insert("task_data".to_string(), task_data);
    for field in [message_field, "lang", "chat_id"] {
        if let Some(value) = request.get(field).filter(|v| !v.is_null()) {
            payload.insert(field.to_string(), value.clone());
        }
    }
    Ok(Value::Object(payload))
}

/// Build task routes
pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route(TASK_GENERATE_PATH, post(generate_task))
        .route(TASK_DETECT_PATH, post(detect_task_update))
        .route(TASK_EXECUTE_PATH, post(execute_task_update))
        .route(TASK_EVALUATE_PATH, post(evaluate_task))
}
