//! One-shot tool discovery and invocation.

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
pub struct ToolsListRequest {
    #[serde(default)]
    pub server_config: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCallRequest {
    #[serde(default)]
    pub server_config: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

pub async fn list(
    State(_ctx): State<Arc<AppContext>>,
    Json(request): Json<ToolsListRequest>,
) -> Response {
    let config = match validate_server_config(&request.server_config.unwrap_or(Value::Null)) {
        Ok(config) => config,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let mut session = match McpSession::connect_single(&config).await {
        Ok(session) => session,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match session.list_tools().await {
        Ok(tools) => {
            session.shutdown().await;
            let tools: Vec<Value> = tools
                .into_iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": tool.input_schema,
                    })
                })
                .collect();
            Json(json!({ "tools": tools })).into_response()
        }
        Err(e) => {
            session.shutdown().await;
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn call(
    State(_ctx): State<Arc<AppContext>>,
    Json(request): Json<ToolsCallRequest>,
) -> Response {
    let config = match validate_server_config(&request.server_config.unwrap_or(Value::Null)) {
        Ok(config) => config,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let Some(name) = request.name.filter(|name| !name.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Tool name is required");
    };

    let session = match McpSession::connect_single(&config).await {
        Ok(session) => session,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match session
        .call_tool_direct("server", &name, request.arguments)
        .await
    {
        Ok(result) => {
            session.shutdown().await;
            let result = serde_json::to_value(&result).unwrap_or(Value::Null);
            Json(json!({ "result": result })).into_response()
        }
        Err(e) => {
            session.shutdown().await;
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
