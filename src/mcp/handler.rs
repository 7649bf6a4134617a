//! rmcp client handler for relay sessions.
//!
//! Each connected server gets its own handler instance carrying the server
//! name, so elicitation requests stay attributable to the back-end that
//! raised them. Sessions opened for one-shot endpoints (connect, tools,
//! resources, prompts) run detached: they advertise no elicitation
//! capability and refuse such requests outright.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rmcp::handler::client::ClientHandler;
use rmcp::model::{
    ClientCapabilities, ClientInfo, CreateElicitationRequestParam, CreateElicitationResult,
    ElicitationAction, ErrorData, Implementation,
};
use rmcp::service::{RequestContext, RoleClient};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::mcp::elicitation::ElicitationRegistry;
use crate::mcp::error::McpError;
use crate::protocols::StreamEvent;
use crate::streaming::StreamContext;

/// Everything a handler needs to bridge an elicitation onto the chat stream
#[derive(Clone)]
pub struct ElicitationSink {
    pub stream: Arc<StreamContext>,
    pub registry: Arc<ElicitationRegistry>,
    pub timeout: Duration,
}

/// Wire shape of the user's answer, as posted back through the chat endpoint
#[derive(Debug, Deserialize)]
struct ElicitationReply {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    content: Option<Value>,
}

pub struct InspectorClientHandler {
    server_name: String,
    sink: Option<ElicitationSink>,
}

impl InspectorClientHandler {
    pub fn relay(server_name: impl Into<String>, sink: ElicitationSink) -> Self {
        Self {
            server_name: server_name.into(),
            sink: Some(sink),
        }
    }

    /// Handler for one-shot sessions with no event stream to answer through
    pub fn detached(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            sink: None,
        }
    }

    fn reply_to_result(response: Value) -> CreateElicitationResult {
        let reply: ElicitationReply = match serde_json::from_value(response) {
            Ok(reply) => reply,
            Err(_) => ElicitationReply {
                action: None,
                content: None,
            },
        };

        let action = match reply.action.as_deref() {
            Some("accept") => ElicitationAction::Accept,
            Some("decline") => ElicitationAction::Decline,
            _ => ElicitationAction::Cancel,
        };

        let content = match action {
            ElicitationAction::Accept => reply.content.and_then(|v| match v {
                Value::Object(map) => Some(Value::Object(map)),
                _ => None,
            }),
            _ => None,
        };

        CreateElicitationResult { action, content }
    }
}

impl ClientHandler for InspectorClientHandler {
    fn get_info(&self) -> ClientInfo {
        let capabilities = if self.sink.is_some() {
            ClientCapabilities::builder().enable_elicitation().build()
        } else {
            ClientCapabilities::default()
        };
        ClientInfo {
            protocol_version: Default::default(),
            capabilities,
            client_info: Implementation {
                name: "mcp-inspector".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
        }
    }

    async fn create_elicitation(
        &self,
        request: CreateElicitationRequestParam,
        _context: RequestContext<RoleClient>,
    ) -> Result<CreateElicitationResult, ErrorData> {
        let Some(sink) = &self.sink else {
            return Err(ErrorData::internal_error(
                "elicitation is not supported on this connection",
                None,
            ));
        };

        let (request_id, rx) = sink.registry.register();
        debug!(
            server = %self.server_name,
            request_id = %request_id,
            "Elicitation requested"
        );

        let schema = serde_json::to_value(&request.requested_schema).unwrap_or(Value::Null);
        sink.stream.emit(&StreamEvent::ElicitationRequest {
            request_id: request_id.clone(),
            message: request.message.clone(),
            schema,
            timestamp: Utc::now(),
        });

        match sink.registry.wait(&request_id, rx, sink.timeout).await {
            Ok(response) => Ok(Self::reply_to_result(response)),
            Err(McpError::ElicitationTimeout) => {
                warn!(
                    server = %self.server_name,
                    request_id = %request_id,
                    "Elicitation timed out"
                );
                Err(ErrorData::internal_error("Elicitation timeout", None))
            }
            Err(e) => Err(ErrorData::internal_error(e.to_string(), None)),
        }
    }
}
