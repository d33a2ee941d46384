//! Shared helpers for the askrelay-server integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use askrelay_core::RelayConfig;
use askrelay_server::{AppState, build_router};
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use tower::ServiceExt;

/// Response pieces the tests look at.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn message(&self) -> String {
        self.json()["message"].as_str().unwrap().to_string()
    }
}

/// Router with an agent binary that is never expected to run successfully.
pub fn app_without_agent(project: &Path) -> Router {
    app(RelayConfig::new(project, project.join("missing-agent")))
}

pub fn app(config: RelayConfig) -> Router {
    build_router(AppState::new(config))
}

/// Config rooted at `project` with short timeouts for tests.
pub fn test_config(project: &Path, agent: PathBuf) -> RelayConfig {
    RelayConfig::new(project, agent)
        .with_timeout(Duration::from_secs(10))
        .with_terminate_grace(Duration::from_millis(500))
        .validate()
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// `POST /ask` with a correct `Content-Length`.
pub fn ask_request(body: impl Into<String>) -> Request<Body> {
    let body = body.into();
    Request::builder()
        .method("POST")
        .uri("/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

/// `POST /ask` with `{"prompt": <prompt>}`.
pub fn ask_prompt(prompt: &str) -> Request<Body> {
    ask_request(serde_json::json!({ "prompt": prompt }).to_string())
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn assert_cors(resp: &TestResponse) {
    let get = |name: header::HeaderName| {
        resp.headers
            .get(&name)
            .unwrap_or_else(|| panic!("missing {name}"))
            .to_str()
            .unwrap()
            .to_string()
    };
    assert_eq!(get(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
    assert_eq!(get(header::ACCESS_CONTROL_ALLOW_METHODS), "POST, GET, OPTIONS");
    assert_eq!(get(header::ACCESS_CONTROL_ALLOW_HEADERS), "Content-Type");
}
