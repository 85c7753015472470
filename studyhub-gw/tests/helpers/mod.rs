//! Shared helpers for studyhub-gw integration tests

#![allow(dead_code)]

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use serde_json::{json, Value};
use studyhub_gw::upstream::{RetryPolicy, UpstreamClient};
use studyhub_gw::{build_router, AppState};

/// Router plus the state behind it, for tests that inspect sessions
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// App whose upstream calls (including upload) go to `base`
pub fn app_with_upstream(base: &str) -> TestApp {
    app_with_bases(Some(base), Some(base))
}

/// App with separate fallback-chain and strict (upload) bases
pub fn app_with_bases(chain: Option<&str>, strict: Option<&str>) -> TestApp {
    let client = |base: Option<&str>| {
        UpstreamClient::new(base.map(str::to_string), Duration::from_secs(5))
            .expect("Should build upstream client")
    };
    let state = AppState::with_clients(client(chain), client(strict), RetryPolicy::none());
    TestApp {
        router: build_router(state.clone()),
        state,
    }
}

/// JSON request
pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// JSON request with one extra header
pub fn json_request_with_header(
    method: &str,
    uri: &str,
    body: Value,
    name: header::HeaderName,
    value: &'static str,
) -> Request<Body> {
    let mut request = json_request(method, uri, body);
    request
        .headers_mut()
        .insert(name, header::HeaderValue::from_static(value));
    request
}

/// Request with a raw body and content type
pub fn raw_request(method: &str, uri: &str, content_type: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

/// Body-less request
pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Extract body as text
pub async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}

pub fn step_json(step: u32, title: &str) -> Value {
    json!({
        "step": step,
        "title": title,
        "description": format!("Learn about {}", title),
        "animation_type": "无",
        "status": if step == 1 { "current" } else { "pending" },
        "type": "quiz",
        "difficulty": "beginner",
        "search_keyword": title,
        "videos": [{
            "title": format!("{} explained", title),
            "url": "https://video.example/v1",
            "cover": "https://video.example/v1.jpg",
            "duration": "7:25"
        }]
    })
}

/// Two-step plan with valid numbering
pub fn plan_json() -> Value {
    json!({
        "title": "Recursion",
        "plan": [step_json(1, "Base cases"), step_json(2, "Recursive calls")]
    })
}

pub fn quiz_task_json() -> Value {
    json!({
        "type": "quiz",
        "difficulty": "beginner",
        "ppt_slide": "# Recursion\n\nA function that calls itself.",
        "questions": [{
            "question": "What stops a recursion?",
            "type": "choice",
            "options": ["The base case", "The stack"],
            "answer": "The base case"
        }],
        "videos": []
    })
}

pub fn coding_task_json() -> Value {
    json!({
        "type": "coding",
        "difficulty": "intermediate",
        "ppt_slide": {"title": "Factorial", "content": ["n! = n * (n-1)!"]},
        "task": {
            "title": "Factorial",
            "description": "Implement factorial recursively",
            "starter_code": "def fact(n):\n    pass",
            "answer": "def fact(n):\n    return 1 if n <= 1 else n * fact(n - 1)"
        },
        "videos": []
    })
}

/// Task generation request for one step
pub fn task_request_json(work_type: &str) -> Value {
    json!({
        "step": 1,
        "title": "Recursion",
        "description": "Functions that call themselves",
        "animation_type": "slide",
        "status": "current",
        "type": work_type,
        "difficulty": "beginner",
        "videos": []
    })
}
