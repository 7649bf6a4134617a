//! Ollama adapter.
//!
//! Ollama's incremental stream interacts badly with tool use, so this
//! adapter simulates streaming: one non-streaming `/api/chat` call whose
//! text is re-emitted as a single delta. This mirrors the workaround the
//! inspector has always shipped for local models.

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::llm::error::{ProviderError, ProviderResult};
use crate::llm::{openai, AgentMessage, ProviderEvent, ToolSpec, ToolUse};

pub(crate) async fn chat(
    http: &reqwest::Client,
    base_url: &str,
    model: &str,
    temperature: f32,
    system: Option<&str>,
    transcript: &[AgentMessage],
    tools: &[ToolSpec],
) -> ProviderResult<Value> {
    let mut body = json!({
        "model": model,
        "messages": openai::build_messages(system, transcript),
        "options": { "temperature": temperature },
        "stream": false,
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(openai::build_tools(tools));
    }

    let response = http
        .post(format!("{}/api/chat", base_url.trim_end_matches('/')))
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

    response.json().await.map_err(ProviderError::Http)
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn stream_step(
    http: &reqwest::Client,
    base_url: &str,
    model: &str,
    temperature: f32,
    system: Option<&str>,
    transcript: &[AgentMessage],
    tools: &[ToolSpec],
) -> ProviderResult<mpsc::UnboundedReceiver<ProviderResult<ProviderEvent>>> {
    let body = chat(http, base_url, model, temperature, system, transcript, tools).await?;
    let (tx, rx) = mpsc::unbounded_channel();
    emit_simulated(&body, &tx);
    Ok(rx)
}

/// Re-emit a completed chat response as a simulated stream
pub(crate) fn emit_simulated(
    body: &Value,
    tx: &mpsc::UnboundedSender<ProviderResult<ProviderEvent>>,
) {
    if let Some(content) = body.pointer("/message/content").and_then(Value::as_str) {
        if !content.is_empty() {
            let _ = tx.send(Ok(ProviderEvent::TextDelta(content.to_string())));
        }
    }

    if let Some(calls) = body.pointer("/message/tool_calls").and_then(Value::as_array) {
        for (index, call) in calls.iter().enumerate() {
            let Some(name) = call.pointer("/function/name").and_then(Value::as_str) else {
                continue;
            };
            let arguments = call
                .pointer("/function/arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));
            let _ = tx.send(Ok(ProviderEvent::ToolUse(ToolUse {
                id: format!("call_{}", index),
                name: name.to_string(),
                arguments,
            })));
        }
    }

    let _ = tx.send(Ok(ProviderEvent::Finished));
}

pub(crate) async fn generate(
    http: &reqwest::Client,
    base_url: &str,
    model: &str,
    temperature: f32,
    system: Option<&str>,
    transcript: &[AgentMessage],
) -> ProviderResult<String> {
    let body = chat(http, base_url, model, temperature, system, transcript, &[]).await?;
    Ok(body
        .pointer("/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(body: Value) -> Vec<ProviderEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        emit_simulated(&body, &tx);
        drop(tx);
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event.unwrap());
        }
        events
    }

    #[test]
    fn completed_text_becomes_one_delta() {
        let events = collect(json!({
            "message": { "role": "assistant", "content": "hello there" }
        }));
        assert!(matches!(
            &events[0],
            ProviderEvent::TextDelta(text) if text == "hello there"
        ));
        assert!(matches!(events.last(), Some(ProviderEvent::Finished)));
    }

    #[test]
    fn tool_calls_get_synthesized_ids() {
        let events = collect(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    { "function": { "name": "weather__lookup", "arguments": { "city": "Lisbon" } } }
                ]
            }
        }));
        let tool_use = events
            .iter()
            .find_map(|e| match e {
                ProviderEvent::ToolUse(call) => Some(call),
                _ => None,
            })
            .expect("tool use event");
        assert_eq!(tool_use.id, "call_0");
        assert_eq!(tool_use.arguments["city"], "Lisbon");
    }
}
