//! Connection test endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::app_context::AppContext;
use crate::mcp::{validate_server_config, McpSession};
use crate::protocols::{AckResponse, ErrorResponse};
use crate::routers::{error_response, error_response_with_details};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    #[serde(default)]
    pub server_config: Option<Value>,
}

/// Validate a server config by connecting, listing tools and disconnecting
pub async fn connect(
    State(_ctx): State<Arc<AppContext>>,
    Json(request): Json<ConnectRequest>,
) -> Response {
    let server_config = request.server_config.unwrap_or(Value::Null);

    let config = match validate_server_config(&server_config) {
        Ok(config) => config,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let mut session = match McpSession::connect_single(&config).await {
        Ok(session) => session,
        Err(e) => {
            return error_response_with_details(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "Failed to create a MCP client. Please double check your server configuration: {}",
                    server_config
                ),
                Value::String(e.to_string()),
            );
        }
    };

    match session.list_tools().await {
        Ok(tools) => {
            info!(tool_count = tools.len(), "Connection test succeeded");
            session.shutdown().await;
            Json(AckResponse::ok()).into_response()
        }
        Err(e) => {
            session.shutdown().await;
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::with_details(
                    format!(
                        "MCP configuration is invalid. Please double check your server configuration: {}",
                        server_config
                    ),
                    Value::String(e.to_string()),
                )),
            )
                .into_response()
        }
    }
}
