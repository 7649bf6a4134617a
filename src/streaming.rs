//! SSE framing for the chat relay.
//!
//! One `StreamContext` exists per chat request and owns everything the
//! emission paths share: the outbound frame channel, the tool-call id
//! counter, and the last-emitted-call-id pointer used to pair results that
//! arrive without an explicit id.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::protocols::{StreamEvent, ToolCallEvent, ToolCallStatus, ToolResultEvent};

pub type SseSender = mpsc::UnboundedSender<Result<Bytes, io::Error>>;
pub type SseReceiver = mpsc::UnboundedReceiver<Result<Bytes, io::Error>>;

/// Request-scoped emission context for one chat stream
pub struct StreamContext {
    tx: SseSender,
    next_tool_call_id: AtomicU64,
    // 0 means "nothing emitted yet"; real ids start at 1
    last_emitted_tool_call_id: AtomicU64,
}

impl StreamContext {
    pub fn channel() -> (std::sync::Arc<Self>, SseReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            std::sync::Arc::new(Self {
                tx,
                next_tool_call_id: AtomicU64::new(0),
                last_emitted_tool_call_id: AtomicU64::new(0),
            }),
            rx,
        )
    }

    /// Send one event frame. Returns false once the client has disconnected.
    pub fn emit(&self, event: &StreamEvent) -> bool {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize stream event: {}", e);
                return true;
            }
        };
        let frame = format!("data: {}\n\n", json);
        if self.tx.send(Ok(Bytes::from(frame))).is_err() {
            tracing::debug!("Client disconnected, dropping stream event");
            return false;
        }
        true
    }

    /// Terminal sentinel frame
    pub fn emit_done(&self) {
        let _ = self.tx.send(Ok(Bytes::from("data: [DONE]\n\n")));
    }

    pub fn next_tool_call_id(&self) -> u64 {
        self.next_tool_call_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Emit a `tool_call` frame and return the id assigned to it
    pub fn emit_tool_call(&self, name: &str, parameters: Value) -> u64 {
        let id = self.next_tool_call_id();
        self.last_emitted_tool_call_id.store(id, Ordering::SeqCst);
        self.emit(&StreamEvent::ToolCall {
            tool_call: ToolCallEvent {
                id,
                name: name.to_string(),
                parameters,
                timestamp: Utc::now(),
                status: ToolCallStatus::Executing,
            },
        });
        id
    }

    /// Emit a `tool_result` frame.
    ///
    /// Results that arrive without an id adopt the most recently emitted
    /// call id. That pairing is only sound while a step has at most one
    /// in-flight call; results with a known id should always pass it.
    pub fn emit_tool_result(
        &self,
        id: Option<u64>,
        result: Option<Value>,
        error: Option<String>,
    ) -> u64 {
        let id = id
            .or_else(|| {
                let last = self.last_emitted_tool_call_id.load(Ordering::SeqCst);
                (last != 0).then_some(last)
            })
            .unwrap_or_else(|| self.next_tool_call_id());
        self.emit(&StreamEvent::ToolResult {
            tool_result: ToolResultEvent {
                id,
                tool_call_id: id,
                result,
                error,
                timestamp: Utc::now(),
            },
        });
        id
    }
}

/// Build the `text/event-stream` response around a frame receiver
pub fn sse_response(rx: SseReceiver) -> Response {
    let stream = UnboundedReceiverStream::new(rx);
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(Body::from_stream(stream))
        .unwrap()
}
