//! Learning plan generation, result callback and live updates
//!
//! Plan generation is asynchronous: the gateway opens a session, hands the
//! session id to the external service and streams its reply back. The
//! finished plan (or a task, or an error) arrives later on
//! `POST /api/plan/update` and is fanned out to SSE subscribers on
//! `GET /api/plan/update?sessionId=...`.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderValue,
    response::{
        sse::{Event, Sse},
        Response,
    },
    routing::post,
    Json, Router,
};
use futures::stream::Stream;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use studyhub_common::models::{LearningPlan, TaskContent};
use studyhub_common::sse::session_event_stream;
use tracing::{debug, info, warn};

use crate::api::{optional_string, parse_json_object, relay_stream};
use crate::error::{ApiError, ApiResult};
use crate::sessions::{SessionError, SessionPayload};
use crate::upstream::RequestBody;
use crate::AppState;

const PLAN_GENERATE_PATH: &str = "/api/learning/plan/generate";
const UPSTREAM_PLAN_GENERATE_PATH: &str = "/api/learning/plan/stream_generate";
const PLAN_UPDATE_PATH: &str = "/api/plan/update";

/// Response header carrying the session id of a generation request
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Field names the external service may use for the session id
const SESSION_ID_FIELDS: [&str; 3] = ["sessionId", "session_id", "id"];

/// POST /api/learning/plan/generate
///
/// The body `id`, when present, is used as the session id.
pub async fn generate_plan(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = parse_json_object(&body)?;
    let messages = match request.get("messages") {
        Some(messages @ Value::Array(_)) => messages.clone(),
        _ => {
            return Err(ApiError::BadRequest(
                "messages is required and must be an array".to_string(),
            ))
        }
    };
    let hint = optional_string(&request, "id");

    let session = state.sessions.create(hint.as_deref()).await?;
    let session_id = session.session_id;

    let mut payload = Map::new();
    payload.insert("id".to_string(), Value::String(session_id.clone()));
    payload.insert("messages".to_string(), messages);
    if let Some(advise) = request.get("advise").filter(|a| !a.is_null()) {
        payload.insert("advise".to_string(), advise.clone());
    }

    info!(session_id = %session_id, "Requesting learning plan generation");

    match state
        .upstream
        .send_streaming(
            Method::POST,
            UPSTREAM_PLAN_GENERATE_PATH,
            RequestBody::Json(Value::Object(payload)),
        )
        .await
    {
        Ok(stream) => {
            let mut response = relay_stream(stream);
            match HeaderValue::from_str(&session_id) {
                Ok(value) => {
                    response.headers_mut().insert(SESSION_ID_HEADER, value);
                }
                Err(_) => warn!(session_id = %session_id, "Session id is not a valid header value"),
            }
            Ok(response)
        }
        Err(e) => {
            let reason = format!("plan generation request failed: {}", e);
            match state.sessions.mark_failed(&session_id, &reason).await {
                Ok(transition) => {
                    info!(session_id = %session_id, ?transition, "Session failed with upstream")
                }
                Err(SessionError::InvalidTransition { from, .. }) => debug!(
                    session_id = %session_id,
                    status = ?from,
                    "Session settled by a callback before the upstream error"
                ),
                Err(err) => debug!(session_id = %session_id, error = %err, "Session not marked failed"),
            }
            Err(e.into())
        }
    }
}

/// What a callback delivers
#[derive(Debug)]
enum CallbackPayload {
    Result(SessionPayload),
    Error(String),
}

/// Null and whitespace-only strings do not name a session
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Extract the session id from a callback body
///
/// Aliases are tried in order; a blank one falls through to the next.
fn callback_session_id(body: &Map<String, Value>) -> ApiResult<String> {
    let raw = SESSION_ID_FIELDS
        .iter()
        .find_map(|field| body.get(*field).filter(|v| !is_blank(v)));

    match raw {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        _ => Err(ApiError::BadRequest(
            "sessionId is required and must be a non-empty string".to_string(),
        )),
    }
}

/// Decode the callback payload: `plan`, then `task`, then `error`
fn callback_payload(body: &mut Map<String, Value>) -> ApiResult<CallbackPayload> {
    if let Some(plan) = body.remove("plan") {
        let plan: LearningPlan = serde_json::from_value(plan)
            .map_err(|e| ApiError::Unprocessable(format!("Invalid plan: {}", e)))?;
        return Ok(CallbackPayload::Result(SessionPayload::Plan(plan)));
    }

    if let Some(task) = body.remove("task") {
        let task: TaskContent = serde_json::from_value(task)
            .map_err(|e| ApiError::Unprocessable(format!("Invalid task: {}", e)))?;
        return Ok(CallbackPayload::Result(SessionPayload::Task(task)));
    }

    match body.remove("error") {
        Some(Value::String(message)) => Ok(CallbackPayload::Error(message)),
        Some(_) => Err(ApiError::Unprocessable(
            "error must be a string".to_string(),
        )),
        None => Err(ApiError::Unprocessable(
            "Callback carries no plan, task or error".to_string(),
        )),
    }
}

/// POST /api/plan/update
///
/// Checked in order: body shape and session id (400), session existence
/// (404, nothing is created), payload (422). Repeated deliveries of the same
/// result are acknowledged without changing anything.
pub async fn plan_callback(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let mut body = parse_json_object(&body)?;
    let session_id = callback_session_id(&body)?;

    if state.sessions.lookup(&session_id).await.is_none() {
        warn!(session_id = %session_id, "Callback for unknown session");
        return Err(ApiError::NotFound(format!("Session not found: {}", session_id)));
    }

    let transition = match callback_payload(&mut body)? {
        CallbackPayload::Result(payload) => {
            state.sessions.mark_completed(&session_id, payload).await?
        }
        CallbackPayload::Error(message) => state.sessions.mark_failed(&session_id, &message).await?,
    };

    info!(session_id = %session_id, ?transition, "Callback applied");

    Ok(Json(json!({ "success": true, "sessionId": session_id })))
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// GET /api/plan/update?sessionId=...
///
/// Subscribes before the session check so no event published in between is
/// lost.
pub async fn plan_events(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Session ID required".to_string()))?;

    let rx = state.event_bus.subscribe();
    if state.sessions.lookup(&session_id).await.is_none() {
        return Err(ApiError::NotFound(format!("Session not found: {}", session_id)));
    }

    Ok(session_event_stream(session_id, rx))
}

/// Build plan routes
pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route(PLAN_GENERATE_PATH, post(generate_plan))
        .route(PLAN_UPDATE_PATH, post(plan_callback).get(plan_events))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_session_id_aliases() {
        for body in [
            json!({"sessionId": "a"}),
            json!({"session_id": "a"}),
            json!({"id": "a"}),
            json!({"sessionId": null, "id": "a"}),
            json!({"sessionId": "", "id": "a"}),
            json!({"sessionId": "  ", "session_id": "a", "id": "b"}),
        ] {
            assert_eq!(callback_session_id(&object(body)).unwrap(), "a");
        }
    }

    #[test]
    fn test_session_id_must_be_non_empty_string() {
        for body in [
            json!({}),
            json!({"sessionId": ""}),
            json!({"sessionId": "", "id": " "}),
            json!({"sessionId": 7}),
        ] {
            assert!(matches!(
                callback_session_id(&object(body)),
                Err(ApiError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn test_payload_kinds() {
        let mut body = object(json!({"error": "model overloaded"}));
        assert!(matches!(
            callback_payload(&mut body).unwrap(),
            CallbackPayload::Error(ref m) if m == "model overloaded"
        ));

        let mut body = object(json!({"plan": {"plan": []}}));
        assert!(matches!(
            callback_payload(&mut body),
            Err(ApiError::Unprocessable(_))
        ));

        let mut body = object(json!({"sessionId": "s"}));
        assert!(matches!(
            callback_payload(&mut body),
            Err(ApiError::Unprocessable(_))
        ));
    }
}
