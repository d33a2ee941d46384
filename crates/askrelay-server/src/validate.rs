//! `/ask` request validation.
//!
//! Checks run in a fixed order and the first failure wins: declared body
//! length, JSON syntax, presence of `prompt`, then prompt length.

use axum::http::{HeaderMap, header};
use serde_json::Value;

use crate::error::ApiError;

/// Read `Content-Length` and check it is present, nonzero and within `max`.
pub fn declared_length(headers: &HeaderMap, max: usize) -> Result<usize, ApiError> {
    let len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or(ApiError::InvalidBody)?;
    if len == 0 || len > max {
        return Err(ApiError::InvalidBody);
    }
    Ok(len)
}

/// Parse a JSON body and extract the trimmed `prompt`.
///
/// Length is counted in characters, not bytes.
pub fn prompt(body: &[u8], max_chars: usize) -> Result<String, ApiError> {
    let json: Value = serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson)?;
    let prompt = json
        .get("prompt")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if prompt.is_empty() {
        return Err(ApiError::PromptRequired);
    }
    if prompt.chars().count() > max_chars {
        return Err(ApiError::PromptTooLong { max: max_chars });
    }
    Ok(prompt.to_string())
}
