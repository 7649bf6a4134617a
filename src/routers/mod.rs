//! HTTP route handlers for the `/api/mcp` surface.

pub mod chat;
pub mod connect;
pub mod health;
pub mod oauth;
pub mod prompts;
pub mod resources;
pub mod tools;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;

use crate::protocols::ErrorResponse;

/// Standard JSON failure body with the status the cause calls for
pub(crate) fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(error))).into_response()
}

pub(crate) fn error_response_with_details(
    status: StatusCode,
    error: impl Into<String>,
    details: Value,
) -> Response {
    (status, Json(ErrorResponse::with_details(error, details))).into_response()
}
