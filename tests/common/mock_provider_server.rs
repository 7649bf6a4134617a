//! Mock LLM provider server.
//!
//! Implements just enough of the ollama `/api/chat` API (the provider whose
//! base URL is reachable through the public request surface) to drive the
//! relay end to end:
//!
//! - a turn whose transcript already contains a tool message gets the final
//!   text answer
//! - a turn carrying tool definitions gets one tool call against the first
//!   advertised tool
//! - anything else gets a plain text answer
//!
//! The special model id `empty-then-recover` returns an empty completion on
//! its first call and recovers on the second, which exercises the relay's
//! one-shot fallback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const FINAL_ANSWER: &str = "The weather in Lisbon is sunny.";
pub const PLAIN_ANSWER: &str = "Hello! I'm a mock assistant.";
pub const RECOVERED_ANSWER: &str = "Recovered response.";

struct MockState {
    request_count: AtomicUsize,
}

pub struct MockProviderServer {
    pub port: u16,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MockProviderServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let state = Arc::new(MockState {
            request_count: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/api/chat", post(handle_chat))
            .with_state(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock provider server failed to start");
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Self {
            port,
            handle: Some(handle),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for MockProviderServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn handle_chat(
    State(state): State<Arc<MockState>>,
    Json(request): Json<Value>,
) -> impl IntoResponse {
    let call_index = state.request_count.fetch_add(1, Ordering::SeqCst);
    let model = request.get("model").and_then(Value::as_str).unwrap_or("");

    if model == "empty-then-recover" {
        let content = if call_index == 0 { "" } else { RECOVERED_ANSWER };
        return Json(json!({
            "model": model,
            "message": { "role": "assistant", "content": content },
            "done": true
        }));
    }

    let messages = request
        .get("messages")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let has_tool_result = messages
        .iter()
        .any(|m| m.get("role").and_then(Value::as_str) == Some("tool"));

    if has_tool_result {
        return Json(json!({
            "model": model,
            "message": { "role": "assistant", "content": FINAL_ANSWER },
            "done": true
        }));
    }

    let first_tool = request
        .pointer("/tools/0/function/name")
        .and_then(Value::as_str);

    if let Some(tool_name) = first_tool {
        return Json(json!({
            "model": model,
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {
                        "function": {
                            "name": tool_name,
                            "arguments": { "city": "Lisbon" }
                        }
                    }
                ]
            },
            "done": true
        }));
    }

    Json(json!({
        "model": model,
        "message": { "role": "assistant", "content": PLAIN_ANSWER },
        "done": true
    }))
}
