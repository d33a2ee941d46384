//! Client-facing error taxonomy.
//!
//! The `Display` text of each variant is exactly the `message` a client sees.
//! Root causes (agent stderr, exit codes, spawn errors) are logged where they
//! happen and never reach this type.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::agent::AgentError;
use crate::types::ErrorBody;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,

    #[error("Invalid request body.")]
    InvalidBody,

    #[error("Invalid JSON.")]
    InvalidJson,

    #[error("prompt is required.")]
    PromptRequired,

    #[error("prompt exceeds {max} characters.")]
    PromptTooLong { max: usize },

    #[error("No response generated. Please rephrase your question.")]
    NoAnswer,

    #[error("AI assistant is temporarily unavailable.")]
    Unavailable,

    #[error("Request timed out. Please try a simpler question.")]
    TimedOut,
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidBody
            | Self::InvalidJson
            | Self::PromptRequired
            | Self::PromptTooLong { .. } => StatusCode::BAD_REQUEST,
            Self::NoAnswer => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::TimedOut { .. } => Self::TimedOut,
            AgentError::EmptyAnswer => Self::NoAnswer,
            AgentError::Spawn { .. } | AgentError::Wait { .. } | AgentError::Failed { .. } => {
                Self::Unavailable
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
