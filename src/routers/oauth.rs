//! OAuth metadata proxy.
//!
//! Browser clients cannot fetch `.well-known` OAuth metadata from arbitrary
//! authorization servers because of CORS; this endpoint fetches it for them.
//! HTTPS only.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};
use tracing::error;

use crate::app_context::AppContext;

const USER_AGENT: &str = "MCP-Inspector/1.0";

pub async fn metadata(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(url) = params.get("url").filter(|url| !url.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing url parameter" })),
        )
            .into_response();
    };

    let metadata_url = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid URL format" })),
            )
                .into_response();
        }
    };

    if metadata_url.scheme() != "https" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Only HTTPS URLs are allowed" })),
        )
            .into_response();
    }

    let response = match ctx
        .client
        .get(metadata_url)
        .header("Accept", "application/json")
        .header("User-Agent", USER_AGENT)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!("OAuth metadata proxy error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let status = response.status();
    if !status.is_success() {
        let status_code =
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            status_code,
            Json(json!({
                "error": format!(
                    "Failed to fetch OAuth metadata: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )
            })),
        )
            .into_response();
    }

    match response.json::<Value>().await {
        Ok(metadata) => Json(metadata).into_response(),
        Err(e) => {
            error!("OAuth metadata proxy error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
