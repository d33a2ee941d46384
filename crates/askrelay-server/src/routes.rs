use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use askrelay_core::RelayConfig;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{Instrument, error, info, info_span, warn};

use crate::agent::{AgentError, AgentRunner};
use crate::error::ApiError;
use crate::types::{AskResponse, HealthResponse};
use crate::validate;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub runner: Arc<AgentRunner>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let runner = AgentRunner::new(&config);
        Self {
            config: Arc::new(config),
            runner: Arc::new(runner),
        }
    }
}

const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, GET, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

/// Build the relay router.
///
/// Anything but an exact known target and method answers 404 JSON, except
/// OPTIONS which answers 204 everywhere. Every response carries the CORS
/// headers.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/ask", post(ask).options(preflight).fallback(not_found))
        .route("/health", get(health).options(preflight).fallback(not_found))
        .fallback(fallback)
        .layer(middleware::from_fn(exact_target))
        .layer(middleware::from_fn(log_request));

    for (name, value) in CORS_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            name,
            HeaderValue::from_static(value),
        ));
    }

    router.with_state(state)
}

/// `POST /ask`: validate the prompt, run the agent and return its answer.
pub async fn ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<AskResponse>, ApiError> {
    let limit = validate::declared_length(&headers, state.config.max_body_bytes)?;
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        warn!(error = %e, "Failed to read request body");
        ApiError::InvalidBody
    })?;
    let prompt = validate::prompt(&bytes, state.config.max_prompt_chars)?;

    info!(prompt_chars = prompt.chars().count(), "Forwarding prompt to agent");
    let answer = state.runner.ask(&prompt).await.map_err(|e| {
        log_agent_failure(&e);
        ApiError::from(e)
    })?;

    Ok(Json(AskResponse::answer(answer)))
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::OK)
}

/// `OPTIONS *` (CORS preflight).
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        return preflight().await.into_response();
    }
    ApiError::NotFound.into_response()
}

/// Routes match the whole request target, so `/health?x=1` is not `/health`.
async fn exact_target(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS && request.uri().query().is_some() {
        return ApiError::NotFound.into_response();
    }
    next.run(request).await
}

fn log_agent_failure(err: &AgentError) {
    match err {
        AgentError::Spawn { reason } => error!(%reason, "Agent could not be started"),
        AgentError::Wait { reason } => error!(%reason, "Agent output could not be collected"),
        AgentError::Failed { code, stderr } => {
            error!(?code, %stderr, "Agent exited unsuccessfully");
        }
        AgentError::TimedOut { after } => warn!(?after, "Agent timed out"),
        AgentError::EmptyAnswer => warn!("Agent produced an empty answer"),
    }
}

/// One log line per request: client, method, path, status, latency.
///
/// Everything logged while handling the request runs inside a span carrying
/// its `request_id`.
async fn log_request(request: Request, next: Next) -> Response {
    let client = client_label(
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
    );
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let span = info_span!("request", request_id = %uuid::Uuid::new_v4());
    let started = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    span.in_scope(|| {
        info!(
            %client,
            %method,
            %path,
            status = response.status().as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Handled request"
        );
    });
    response
}

fn client_label(addr: Option<SocketAddr>) -> String {
    addr.map_or_else(|| "-".to_string(), |a| a.ip().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use tower::ServiceExt;

    use super::*;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn request_id_of(line: &str) -> Option<&str> {
        let (_, rest) = line.split_once("request_id=")?;
        rest.split(|c: char| c == '}' || c.is_whitespace()).next()
    }

    #[tokio::test]
    async fn failure_cause_logs_under_the_request_span() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::new(dir.path(), dir.path().join("missing-agent"));
        let body = r#"{"prompt": "hello"}"#;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/ask")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();
        let resp = build_router(AppState::new(config))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let id_for = |needle: &str| {
            text.lines()
                .find(|l| l.contains(needle))
                .and_then(request_id_of)
                .map(str::to_owned)
                .unwrap_or_else(|| panic!("no request_id on {needle:?} in:\n{text}"))
        };
        assert_eq!(
            id_for("Agent could not be started"),
            id_for("Handled request")
        );
    }

    #[test]
    fn client_label_shows_ip_only() {
        let addr: SocketAddr = ([127, 0, 0, 1], 51234).into();
        assert_eq!(client_label(Some(addr)), "127.0.0.1");
        assert_eq!(client_label(None), "-");
    }

    #[test]
    fn cors_header_values_are_valid() {
        for (_, value) in CORS_HEADERS {
            assert!(HeaderValue::from_str(value).is_ok());
        }
    }
}
