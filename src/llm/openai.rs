//! OpenAI Chat Completions adapter.
//!
//! Also serves DeepSeek, which exposes the same API under its own base URL.

use std::collections::BTreeMap;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::error;

use crate::llm::error::{ProviderError, ProviderResult};
use crate::llm::{AgentMessage, ProviderEvent, ToolSpec, ToolUse};
use crate::protocols::MessageRole;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

fn role_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
    }
}

pub(crate) fn build_messages(system: Option<&str>, transcript: &[AgentMessage]) -> Vec<Value> {
    let mut messages = Vec::new();
    if let Some(system) = system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    for entry in transcript {
        match entry {
            AgentMessage::Text { role, content } => {
                messages.push(json!({ "role": role_str(*role), "content": content }));
            }
            AgentMessage::ToolCalls { text, calls } => {
                let tool_calls: Vec<Value> = calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            },
                        })
                    })
                    .collect();
                messages.push(json!({
                    "role": "assistant",
                    "content": text.clone().unwrap_or_default(),
                    "tool_calls": tool_calls,
                }));
            }
            AgentMessage::ToolResults { results } => {
                for result in results {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": result.id,
                        "content": result.content,
                    }));
                }
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
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description.clone().unwrap_or_default(),
                    "parameters": tool.input_schema,
                },
            })
        })
        .collect()
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
    let mut body = json!({
        "model": model,
        "messages": build_messages(system, transcript),
        "temperature": temperature,
        "stream": true,
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(build_tools(tools));
        body["tool_choice"] = json!("auto");
    }

    let response = http
        .post(format!("{}/chat/completions", base_url))
        .bearer_auth(api_key)
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

/// Parse an OpenAI-style SSE body into unified provider events.
///
/// Tool-call deltas are accumulated per choice index and flushed when the
/// chunk carrying `finish_reason` arrives (or the stream ends).
pub(crate) async fn pump_stream<S, B, E>(
    stream: S,
    tx: mpsc::UnboundedSender<ProviderResult<ProviderEvent>>,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    #[derive(Default)]
    struct ToolCallBuilder {
        id: Option<String>,
        name: String,
        arguments: String,
    }

    let mut builders: BTreeMap<u64, ToolCallBuilder> = BTreeMap::new();
    let mut flushed = false;
    let mut sse = Box::pin(stream.eventsource());

    let flush =
        |builders: &mut BTreeMap<u64, ToolCallBuilder>,
         tx: &mpsc::UnboundedSender<ProviderResult<ProviderEvent>>| {
            for (index, builder) in std::mem::take(builders) {
                if builder.name.is_empty() {
                    continue;
                }
                let arguments = if builder.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&builder.arguments).unwrap_or(json!({}))
                };
                let _ = tx.send(Ok(ProviderEvent::ToolUse(ToolUse {
                    id: builder.id.unwrap_or_else(|| format!("call_{}", index)),
                    name: builder.name,
                    arguments,
                })));
            }
        };

    while let Some(event) = sse.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                let _ = tx.send(Err(ProviderError::Stream(e.to_string())));
                return;
            }
        };

        if event.data == "[DONE]" {
            break;
        }

        let chunk: Value = match serde_json::from_str(&event.data) {
            Ok(chunk) => chunk,
            Err(e) => {
                error!("Skipping unparsable completion chunk: {}", e);
                continue;
            }
        };

        if let Some(message) = chunk.pointer("/error/message").and_then(Value::as_str) {
            let _ = tx.send(Err(ProviderError::Stream(message.to_string())));
            return;
        }

        let Some(choice) = chunk.pointer("/choices/0") else {
            continue;
        };

        if let Some(content) = choice.pointer("/delta/content").and_then(Value::as_str) {
            if !content.is_empty() {
                let _ = tx.send(Ok(ProviderEvent::TextDelta(content.to_string())));
            }
        }

        if let Some(tool_calls) = choice.pointer("/delta/tool_calls").and_then(Value::as_array) {
            for delta in tool_calls {
                let index = delta.get("index").and_then(Value::as_u64).unwrap_or(0);
                let builder = builders.entry(index).or_default();
                if let Some(id) = delta.get("id").and_then(Value::as_str) {
                    builder.id = Some(id.to_string());
                }
                if let Some(name) = delta.pointer("/function/name").and_then(Value::as_str) {
                    builder.name.push_str(name);
                }
                if let Some(arguments) = delta
                    .pointer("/function/arguments")
                    .and_then(Value::as_str)
                {
                    builder.arguments.push_str(arguments);
                }
            }
        }

        if choice
            .get("finish_reason")
            .map(|r| !r.is_null())
            .unwrap_or(false)
        {
            flush(&mut builders, &tx);
            flushed = true;
        }
    }

    if !flushed {
        flush(&mut builders, &tx);
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
    let body = json!({
        "model": model,
        "messages": build_messages(system, transcript),
        "temperature": temperature,
        "stream": false,
    });

    let response = http
        .post(format!("{}/chat/completions", base_url))
        .bearer_auth(api_key)
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
    Ok(body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    fn sse_body(frames: &[&str]) -> Vec<Result<Bytes, std::convert::Infallible>> {
        frames
            .iter()
            .map(|frame| Ok(Bytes::from(format!("data: {}\n\n", frame))))
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
    async fn text_deltas_are_forwarded_in_order() {
        let events = collect(sse_body(&[
            r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]))
        .await;

        let texts: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                Ok(ProviderEvent::TextDelta(text)) => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Hel", "lo"]);
        assert!(matches!(events.last(), Some(Ok(ProviderEvent::Finished))));
    }

    #[tokio::test]
    async fn tool_call_deltas_accumulate_across_chunks() {
        let events = collect(sse_body(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"weather__lookup","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Lisbon\"}"}}]}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ]))
        .await;

        let tool_uses: Vec<&ToolUse> = events
            .iter()
            .filter_map(|e| match e {
                Ok(ProviderEvent::ToolUse(call)) => Some(call),
                _ => None,
            })
            .collect();
        assert_eq!(tool_uses.len(), 1);
        assert_eq!(tool_uses[0].id, "call_abc");
        assert_eq!(tool_uses[0].name, "weather__lookup");
        assert_eq!(tool_uses[0].arguments["city"], "Lisbon");
    }

    #[tokio::test]
    async fn upstream_error_payload_becomes_stream_error() {
        let events = collect(sse_body(&[r#"{"error":{"message":"rate limited"}}"#])).await;
        assert!(matches!(
            events.first(),
            Some(Err(ProviderError::Stream(message))) if message == "rate limited"
        ));
    }

    #[test]
    fn tool_results_become_tool_role_messages() {
        let transcript = vec![
            AgentMessage::ToolCalls {
                text: None,
                calls: vec![ToolUse {
                    id: "call_1".to_string(),
                    name: "weather__lookup".to_string(),
                    arguments: json!({"city": "Lisbon"}),
                }],
            },
            AgentMessage::ToolResults {
                results: vec![crate::llm::agent::ToolOutcome {
                    id: "call_1".to_string(),
                    name: "weather__lookup".to_string(),
                    content: "sunny".to_string(),
                    is_error: false,
                }],
            },
        ];

        let messages = build_messages(Some("be brief"), &transcript);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
        assert_eq!(messages[2]["content"], "sunny");
    }
}
