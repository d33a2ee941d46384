//! JSON payloads returned by the relay.

use serde::Serialize;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

/// Body of a successful `/ask` response.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub success: bool,
    pub data: AskData,
}

#[derive(Debug, Serialize)]
pub struct AskData {
    pub answer: String,
}

impl AskResponse {
    pub const fn answer(answer: String) -> Self {
        Self {
            success: true,
            data: AskData { answer },
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

impl HealthResponse {
    pub const OK: Self = Self { status: "ok" };
}
