// Mock MCP server speaking JSON-RPC over streamable HTTP

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
struct MockState {
    with_tools: bool,
}

/// Mock MCP server that returns hardcoded responses for testing
pub struct MockMcpServer {
    pub port: u16,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl MockMcpServer {
    /// Start a mock server exposing one `get_weather` tool
    pub async fn start() -> Self {
        Self::start_inner(true).await
    }

    /// Start a mock server exposing no tools at all
    pub async fn start_empty() -> Self {
        Self::start_inner(false).await
    }

    async fn start_inner(with_tools: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let state = Arc::new(MockState { with_tools });
        let app = Router::new()
            .route(
                "/mcp",
                post(handle_mcp_request).get(handle_other).delete(handle_other),
            )
            .with_state(state);

        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock MCP server failed to start");
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        MockMcpServer {
            port,
            server_handle: Some(server_handle),
        }
    }

    /// Get the full URL for this mock server
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/mcp", self.port)
    }
}

impl Drop for MockMcpServer {
    fn drop(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}

// The streamable-HTTP spec allows servers to decline the standalone GET
// stream; clients fall back to plain request/response
async fn handle_other() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn handle_mcp_request(
    State(state): State<Arc<MockState>>,
    Json(request): Json<Value>,
) -> Response {
    let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");

    // Notifications carry no id and expect 202
    let Some(id) = request.get("id").filter(|id| !id.is_null()).cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };

    let response = match method {
        "initialize" => {
            let protocol_version = request
                .pointer("/params/protocolVersion")
                .cloned()
                .unwrap_or_else(|| json!("2025-03-26"));
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": protocol_version,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": "Mock MCP Server",
                        "version": "1.0.0"
                    }
                }
            })
        }
        "ping" => json!({ "jsonrpc": "2.0", "id": id, "result": {} }),
        "tools/list" => {
            let tools = if state.with_tools {
                json!([
                    {
                        "name": "get_weather",
                        "description": "Mock weather lookup",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "city": { "type": "string" }
                            },
                            "required": ["city"]
                        }
                    }
                ])
            } else {
                json!([])
            };
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "tools": tools }
            })
        }
        "tools/call" => {
            let empty = json!({});
            let params = request.get("params").unwrap_or(&empty);
            let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");

            match tool_name {
                "get_weather" => {
                    let city = params
                        .pointer("/arguments/city")
                        .and_then(|c| c.as_str())
                        .unwrap_or("nowhere");
                    json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {
                            "content": [
                                {
                                    "type": "text",
                                    "text": format!("Mock weather for: {}", city)
                                }
                            ],
                            "isError": false
                        }
                    })
                }
                _ => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32602,
                        "message": format!("Unknown tool: {}", tool_name)
                    }
                }),
            }
        }
        _ => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": -32601,
                "message": format!("Method not found: {}", method)
            }
        }),
    };

    Json(response).into_response()
}
