//! Liveness probes.

use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde_json::json;

/// Root-level `GET /health`
pub async fn health() -> Response {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// `GET /api/mcp/health`
pub async fn api_health() -> Response {
    Json(json!({
        "service": "MCP API",
        "status": "ready",
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}
