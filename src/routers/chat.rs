//! The chat streaming relay.
//!
//! Bridges one HTTP chat request to the configured MCP servers and the
//! selected LLM provider, presenting the combined activity as one ordered
//! SSE response. Also carries the alternate control path that answers a
//! previously emitted elicitation request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::app_context::AppContext;
use crate::llm::{
    AgentMessage, AgentRun, ProviderClient, ToolExecutor, ToolOutcome, ToolSpec, ToolUse,
};
use crate::mcp::{validate_server_configs, ElicitationSink, McpSession, SessionTool};
use crate::protocols::{
    AckResponse, ChatRequest, StreamEvent, ACTION_ELICITATION_RESPONSE,
};
use crate::routers::{error_response, error_response_with_details};
use crate::streaming::{sse_response, StreamContext};

/// Emitted when both the stream and the one-shot fallback came back empty
pub const FALLBACK_APOLOGY: &str = "Failed to generate response. Please try again. ";

pub async fn chat(State(ctx): State<Arc<AppContext>>, Json(request): Json<ChatRequest>) -> Response {
    if request.action.as_deref() == Some(ACTION_ELICITATION_RESPONSE) {
        return elicitation_response(&ctx, request);
    }
    chat_turn(ctx, request).await
}

/// Resolve a pending elicitation with the caller-supplied payload.
///
/// Missing id and unknown id fail distinctly (400 vs 404) so clients can
/// tell a malformed request from a timed-out entry.
fn elicitation_response(ctx: &AppContext, request: ChatRequest) -> Response {
    let Some(request_id) = request.request_id.as_deref().filter(|id| !id.is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "requestId is required for elicitation_response action",
        );
    };

    let response = request.response.unwrap_or(Value::Null);
    if !ctx.elicitations.resolve(request_id, response) {
        return error_response(
            StatusCode::NOT_FOUND,
            "No pending elicitation found for this requestId",
        );
    }

    debug!(request_id, "Resolved pending elicitation");
    Json(AckResponse::ok()).into_response()
}

async fn chat_turn(ctx: Arc<AppContext>, request: ChatRequest) -> Response {
    // Required parameters, checked before anything is connected
    let Some(model) = request.model.clone().filter(|m| !m.id.is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "model (with id), apiKey, and messages are required",
        );
    };
    let api_key = request.api_key.clone().unwrap_or_default();
    let api_key_ok = !api_key.is_empty()
        || matches!(model.provider, crate::protocols::ModelProvider::Ollama);
    let Some(messages) = request.messages.clone() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "model (with id), apiKey, and messages are required",
        );
    };
    if !api_key_ok {
        return error_response(
            StatusCode::BAD_REQUEST,
            "model (with id), apiKey, and messages are required",
        );
    }

    // serverConfigs is optional: absent means a toolless turn. Present
    // entries validate independently so one bad server never takes down the
    // rest; only an all-invalid map fails the request.
    let server_configs = request.server_configs.clone().unwrap_or_default();
    let validation = validate_server_configs(&server_configs);
    if !server_configs.is_empty() && validation.all_failed() {
        return error_response_with_details(
            StatusCode::BAD_REQUEST,
            "All server configurations failed validation",
            serde_json::to_value(&validation.errors).unwrap_or(Value::Null),
        );
    }

    let ollama_base_url = request
        .ollama_base_url
        .clone()
        .unwrap_or_else(|| ctx.config.ollama_base_url.clone());
    let provider = match ProviderClient::new(ctx.client.clone(), &model, &api_key, &ollama_base_url)
    {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to create LLM model: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    // The frame channel exists before the session so elicitation handlers can
    // hold the emission context from the moment they connect
    let (stream_ctx, sse_rx) = StreamContext::channel();
    let sink = ElicitationSink {
        stream: Arc::clone(&stream_ctx),
        registry: Arc::clone(&ctx.elicitations),
        timeout: ctx.config.elicitation_timeout(),
    };

    let (session, tools) = if validation.valid.is_empty() {
        (None, Vec::new())
    } else {
        let mut session = match McpSession::connect(&validation.valid, Some(sink)).await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to create MCP session: {}", e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
        };

        match session.list_tools().await {
            Ok(tools) => (Some(session), tools),
            Err(e) => {
                error!("Failed to discover tools: {}", e);
                session.shutdown().await;
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
        }
    };

    info!(
        servers = session.as_ref().map(|s| s.server_names().len()).unwrap_or(0),
        tools = tools.len(),
        model = provider.model_id(),
        "Chat stream starting"
    );

    let system_prompt = request
        .system_prompt
        .clone()
        .unwrap_or_else(|| "You are a helpful assistant with access to MCP tools.".to_string());
    let transcript = AgentMessage::from_incoming(&messages);
    let max_steps = ctx.config.max_agent_steps;
    let config_errors = validation.errors;

    tokio::spawn(async move {
        run_relay(
            stream_ctx,
            session,
            provider,
            system_prompt,
            transcript,
            tools,
            max_steps,
            config_errors,
        )
        .await;
    });

    sse_response(sse_rx)
}

/// Executes tool invocations, framing each one with `tool_call` and
/// `tool_result` events carrying the same request-scoped id.
struct StreamingToolExecutor<'a> {
    session: Option<&'a McpSession>,
    stream: &'a StreamContext,
}

#[async_trait]
impl ToolExecutor for StreamingToolExecutor<'_> {
    async fn execute(&self, call: &ToolUse) -> ToolOutcome {
        let call_id = self
            .stream
            .emit_tool_call(&call.name, call.arguments.clone());

        let Some(session) = self.session else {
            let message = format!("No MCP session available for tool: {}", call.name);
            self.stream
                .emit_tool_result(Some(call_id), None, Some(message.clone()));
            return ToolOutcome {
                id: call.id.clone(),
                name: call.name.clone(),
                content: message,
                is_error: true,
            };
        };

        match session.call_tool(&call.name, call.arguments.clone()).await {
            Ok(result) => {
                let value = serde_json::to_value(&result).unwrap_or(Value::Null);
                self.stream
                    .emit_tool_result(Some(call_id), Some(value.clone()), None);
                ToolOutcome {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    content: extract_result_text(&value),
                    is_error: result.is_error.unwrap_or(false),
                }
            }
            Err(e) => {
                let message = e.to_string();
                self.stream
                    .emit_tool_result(Some(call_id), None, Some(message.clone()));
                ToolOutcome {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    content: message,
                    is_error: true,
                }
            }
        }
    }
}

/// Pull the text blocks out of a serialized tool result, falling back to the
/// raw JSON when the result carries no text content.
fn extract_result_text(result: &Value) -> String {
    let texts: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if texts.is_empty() {
        result.to_string()
    } else {
        texts.join("\n")
    }
}

/// Drive the stream to completion. Cleanup (MCP disconnect, channel close)
/// runs on every exit path; the channel closes when the last sender drops.
#[allow(clippy::too_many_arguments)]
async fn run_relay(
    stream_ctx: Arc<StreamContext>,
    session: Option<McpSession>,
    provider: ProviderClient,
    system_prompt: String,
    transcript: Vec<AgentMessage>,
    tools: Vec<SessionTool>,
    max_steps: usize,
    config_errors: HashMap<String, String>,
) {
    if !config_errors.is_empty() {
        stream_ctx.emit(&StreamEvent::ServerConfigErrors {
            errors: config_errors,
        });
    }

    let tool_specs: Vec<ToolSpec> = tools
        .iter()
        .map(|tool| ToolSpec {
            name: tool.qualified_name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
        })
        .collect();

    let agent = AgentRun {
        provider: &provider,
        system_prompt: Some(system_prompt),
        max_steps,
    };

    let executor = StreamingToolExecutor {
        session: session.as_ref(),
        stream: stream_ctx.as_ref(),
    };

    let emitter = Arc::clone(&stream_ctx);
    let outcome = agent
        .stream(transcript.clone(), &tool_specs, &executor, move |chunk| {
            emitter.emit(&StreamEvent::Text {
                content: chunk.to_string(),
                error: None,
            });
        })
        .await;

    match outcome {
        Ok(has_content) => {
            if !has_content {
                // Some provider/tool-use combinations never produce
                // incremental text; one non-streaming attempt recovers the
                // final answer in that case
                debug!("No content from stream; falling back to completion");
                fallback_to_completion(&stream_ctx, &agent, transcript).await;
            }
            stream_ctx.emit(&StreamEvent::ElicitationComplete);
            stream_ctx.emit_done();
        }
        Err(e) => {
            error!("Chat stream failed: {}", e);
            stream_ctx.emit(&StreamEvent::Error {
                error: e.to_string(),
            });
        }
    }

    if let Some(session) = session {
        session.shutdown().await;
    }
}

async fn fallback_to_completion(
    stream_ctx: &StreamContext,
    agent: &AgentRun<'_>,
    transcript: Vec<AgentMessage>,
) {
    match agent.generate(transcript).await {
        Ok(text) if !text.trim().is_empty() => {
            stream_ctx.emit(&StreamEvent::Text {
                content: text,
                error: None,
            });
        }
        Ok(_) => {
            stream_ctx.emit(&StreamEvent::Text {
                content: FALLBACK_APOLOGY.to_string(),
                error: None,
            });
        }
        Err(e) => {
            stream_ctx.emit(&StreamEvent::Text {
                content: FALLBACK_APOLOGY.to_string(),
                error: Some(e.to_string()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_text_extraction_prefers_text_blocks() {
        let result = json!({
            "content": [
                { "type": "text", "text": "line one" },
                { "type": "image", "data": "..." },
                { "type": "text", "text": "line two" }
            ],
            "isError": false
        });
        assert_eq!(extract_result_text(&result), "line one\nline two");
    }

    #[test]
    fn result_text_extraction_falls_back_to_raw_json() {
        let result = json!({ "structuredContent": { "ok": true } });
        assert_eq!(extract_result_text(&result), result.to_string());
    }
}
