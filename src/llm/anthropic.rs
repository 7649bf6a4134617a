//! Anthropic Messages adapter.

use std::collections::BTreeMap;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::error;

use crate::llm::error::{ProviderError, ProviderResult};
use crate::llm::{AgentMessage, ProviderEvent, ToolSpec, ToolUse};
use crate::protocols::MessageRole;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

pub(crate) fn build_messages(transcript: &[AgentMessage]) -> Vec<Value> {
    let mut messages = Vec::new();
    for entry in transcript {
        match entry {
            AgentMessage::Text { role, content } => {
                // Anthropic has no system role in messages; the relay folds
                // system entries into the top-level system field
                let role = match role {
                    MessageRole::Assistant => "assistant",
                    _ => "user",
                };
                messages.push(json!({ "role": role, "content": content }));
            }
            AgentMessage::ToolCalls { text, calls } => {
                let mut blocks = Vec::new();
                if let Some(text) = text {
                    if !text.is_empty() {
                        blocks.push(json!({ "type": "text", "text": text }));
                    }
                }
                for call in calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                messages.push(json!({ "role": "assistant", "content": blocks }));
            }
            AgentMessage::ToolResults { results } => {
                let blocks: Vec<Value> = results
                    .iter()
                    .map(|result| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": result.id,
                            "content": result.content,
                            "is_error": result.is_error,
                        })
                    })
                    .collect();
                messages.push(json!({ "role": "user", "content": blocks }));
            }
        }
    }
    messages
}

pub(crate) fn build_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description.clone().unwrap_or_default(),
                "input_schema": tool.input_schema,
            })
        })
        .collect()
}

fn build_body(
    model: &str,
    temperature: f32,
    system: Option<&str>,
    transcript: &[AgentMessage],
    tools: &[ToolSpec],
    stream: bool,
) -> Value {
    let mut body = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "temperature": temperature,
        "messages": build_messages(transcript),
        "stream": stream,
    });
    if let Some(system) = system {
        body["system"] = json!(system);
    }
    if !tools.is_empty() {
        body["tools"] = Value::Array(build_tools(tools));
    }
    body
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn stream_step(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    temperature: f32,
    system: Option<&str>,
    transcript: &[AgentMessage],
    tools: &[ToolSpec],
) -> ProviderResult<mpsc::UnboundedReceiver<ProviderResult<ProviderEvent>>> {
    let body = build_body(model, temperature, system, transcript, tools, true);

    let response = http
        .post(format!("{}/v1/messages", base_url))
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Accept", "text/event-stream")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let byte_stream = response.bytes_stream();
    tokio::spawn(async move {
        pump_stream(byte_stream, tx).await;
    });
    Ok(rx)
}

/// Parse an Anthropic SSE body into unified provider events.
///
/// Tool-use blocks stream their input as `input_json_delta` fragments; the
/// accumulated JSON is parsed when the block stops.
pub(crate) async fn pump_stream<S, B, E>(
    stream: S,
    tx: mpsc::UnboundedSender<ProviderResult<ProviderEvent>>,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    struct ToolUseBuilder {
        id: String,
        name: String,
        input_json: String,
    }

    let mut tool_blocks: BTreeMap<u64, ToolUseBuilder> = BTreeMap::new();
    let mut sse = Box::pin(stream.eventsource());

    while let Some(event) = sse.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                let _ = tx.send(Err(ProviderError::Stream(e.to_string())));
                return;
            }
        };

        let data: Value = match serde_json::from_str(&event.data) {
            Ok(data) => data,
            Err(e) => {
                if !event.data.is_empty() {
                    error!("Skipping unparsable message event: {}", e);
                }
                continue;
            }
        };

        match event.event.as_str() {
            "content_block_start" => {
                let index = data.get("index").and_then(Value::as_u64).unwrap_or(0);
                if data.pointer("/content_block/type").and_then(Value::as_str)
                    == Some("tool_use")
                {
                    tool_blocks.insert(
                        index,
                        ToolUseBuilder {
                            id: data
                                .pointer("/content_block/id")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            name: data
                                .pointer("/content_block/name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            input_json: String::new(),
                        },
                    );
                }
            }
            "content_block_delta" => {
                let index = data.get("index").and_then(Value::as_u64).unwrap_or(0);
                match data.pointer("/delta/type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        if let Some(text) = data.pointer("/delta/text").and_then(Value::as_str) {
                            if !text.is_empty() {
                                let _ =
                                    tx.send(Ok(ProviderEvent::TextDelta(text.to_string())));
                            }
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some(fragment) =
                            data.pointer("/delta/partial_json").and_then(Value::as_str)
                        {
                            if let Some(builder) = tool_blocks.get_mut(&index) {
                                builder.input_json.push_str(fragment);
                            }
                        }
                    }
                    _ => {}
                }
            }
            "content_block_stop" => {
                let index = data.get("index").and_then(Value::as_u64).unwrap_or(0);
                if let Some(builder) = tool_blocks.remove(&index) {
                    let arguments = if builder.input_json.trim().is_empty() {
                        json!({})
                    } else {
                        serde_json::from_str(&builder.input_json).unwrap_or(json!({}))
                    };
                    let _ = tx.send(Ok(ProviderEvent::ToolUse(ToolUse {
                        id: builder.id,
                        name: builder.name,
                        arguments,
                    })));
                }
            }
            "message_stop" => break,
            "error" => {
                let message = data
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown provider error");
                let _ = tx.send(Err(ProviderError::Stream(message.to_string())));
                return;
            }
            // message_start, message_delta, ping
            _ => {}
        }
    }

    let _ = tx.send(Ok(ProviderEvent::Finished));
}

pub(crate) async fn generate(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    temperature: f32,
    system: Option<&str>,
    transcript: &[AgentMessage],
) -> ProviderResult<String> {
    let body = build_body(model, temperature, system, transcript, &[], false);

    let response = http
        .post(format!("{}/v1/messages", base_url))
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let body: Value = response.json().await?;
    let text = body
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    fn sse_frames(frames: &[(&str, &str)]) -> Vec<Result<Bytes, std::convert::Infallible>> {
        frames
            .iter()
            .map(|(event, data)| {
                Ok(Bytes::from(format!("event: {}\ndata: {}\n\n", event, data)))
            })
            .collect()
    }

    async fn collect(
        frames: Vec<Result<Bytes, std::convert::Infallible>>,
    ) -> Vec<ProviderResult<ProviderEvent>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        pump_stream(stream::iter(frames), tx).await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn text_deltas_are_forwarded() {
        let events = collect(sse_frames(&[
            ("message_start", r#"{"message":{"id":"msg_1"}}"#),
            (
                "content_block_start",
                r#"{"index":0,"content_block":{"type":"text"}}"#,
            ),
            (
                "content_block_delta",
                r#"{"index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
            ),
            ("content_block_stop", r#"{"index":0}"#),
            ("message_stop", r#"{}"#),
        ]))
        .await;

        assert!(matches!(
            events.first(),
            Some(Ok(ProviderEvent::TextDelta(text))) if text == "Hi"
        ));
        assert!(matches!(events.last(), Some(Ok(ProviderEvent::Finished))));
    }

    #[tokio::test]
    async fn tool_use_input_accumulates_until_block_stop() {
        let events = collect(sse_frames(&[
            (
                "content_block_start",
                r#"{"index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"weather__lookup"}}"#,
            ),
            (
                "content_block_delta",
                r#"{"index":0,"delta":{"type":"input_json_delta","partial_json":"{\"city\":"}}"#,
            ),
            (
                "content_block_delta",
                r#"{"index":0,"delta":{"type":"input_json_delta","partial_json":"\"Lisbon\"}"}}"#,
            ),
            ("content_block_stop", r#"{"index":0}"#),
            ("message_stop", r#"{}"#),
        ]))
        .await;

        let tool_use = events
            .iter()
            .find_map(|e| match e {
                Ok(ProviderEvent::ToolUse(call)) => Some(call),
                _ => None,
            })
            .expect("tool use event");
        assert_eq!(tool_use.id, "toolu_1");
        assert_eq!(tool_use.arguments["city"], "Lisbon");
    }

    #[tokio::test]
    async fn provider_error_event_surfaces() {
        let events = collect(sse_frames(&[(
            "error",
            r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )]))
        .await;
        assert!(matches!(
            events.first(),
            Some(Err(ProviderError::Stream(message))) if message == "Overloaded"
        ));
    }

    #[test]
    fn system_prompt_is_a_top_level_field() {
        let body = build_body("claude-test", 1.0, Some("be brief"), &[], &[], true);
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn tool_results_become_user_content_blocks() {
        let transcript = vec![AgentMessage::ToolResults {
            results: vec![crate::llm::agent::ToolOutcome {
                id: "toolu_1".to_string(),
                name: "weather__lookup".to_string(),
                content: "sunny".to_string(),
                is_error: false,
            }],
        }];
        let messages = build_messages(&transcript);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"][0]["type"], "tool_result");
        assert_eq!(messages[0]["content"][0]["tool_use_id"], "toolu_1");
    }
}
