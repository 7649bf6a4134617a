//! One-shot resource listing and reading.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_context::AppContext;
use crate::mcp::{validate_server_config, McpSession};
use crate::routers::error_response;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesListRequest {
    #[serde(default)]
    pub server_config: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesReadRequest {
    #[serde(default)]
    pub server_config: Option<Value>,
    #[serde(default)]
    pub uri: Option<String>,
}

pub async fn list(
    State(_ctx): State<Arc<AppContext>>,
    Json(request): Json<ResourcesListRequest>,
) -> Response {
    let config = match validate_server_config(&request.server_config.unwrap_or(Value::Null)) {
        Ok(config) => config,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let session = match McpSession::connect_single(&config).await {
        Ok(session) => session,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let result = session.list_resources("server").await;
    session.shutdown().await;

    match result {
        Ok(resources) => Json(json!({ "resources": resources })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn read(
    State(_ctx): State<Arc<AppContext>>,
    Json(request): Json<ResourcesReadRequest>,
) -> Response {
    let config = match validate_server_config(&request.server_config.unwrap_or(Value::Null)) {
        Ok(config) => config,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let Some(uri) = request.uri.filter(|uri| !uri.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Resource URI is required");
    };

    let session = match McpSession::connect_single(&config).await {
        Ok(session) => session,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let result = session.read_resource("server", &uri).await;
    session.shutdown().await;

    match result {
        Ok(content) => Json(json!({ "content": content })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
