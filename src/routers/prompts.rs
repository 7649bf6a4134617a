//! One-shot prompt listing and expansion.

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
pub struct PromptsListRequest {
    #[serde(default)]
    pub server_config: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsGetRequest {
    #[serde(default)]
    pub server_config: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
}

pub async fn list(
    State(_ctx): State<Arc<AppContext>>,
    Json(request): Json<PromptsListRequest>,
) -> Response {
    let config = match validate_server_config(&request.server_config.unwrap_or(Value::Null)) {
        Ok(config) => config,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let session = match McpSession::connect_single(&config).await {
        Ok(session) => session,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let result = session.list_prompts("server").await;
    session.shutdown().await;

    match result {
        Ok(prompts) => Json(json!({ "prompts": prompts })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn get(
    State(_ctx): State<Arc<AppContext>>,
    Json(request): Json<PromptsGetRequest>,
) -> Response {
    let config = match validate_server_config(&request.server_config.unwrap_or(Value::Null)) {
        Ok(config) => config,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let Some(name) = request.name.filter(|name| !name.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Prompt name is required");
    };

    let session = match McpSession::connect_single(&config).await {
        Ok(session) => session,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let result = session.get_prompt("server", &name, request.args).await;
    session.shutdown().await;

    match result {
        Ok(content) => Json(json!({ "content": content })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
