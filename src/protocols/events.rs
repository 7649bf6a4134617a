use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a tool invocation as surfaced to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Executing,
    Completed,
    Error,
}

/// `tool_call` event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallEvent {
    /// Monotonically increasing id, scoped to one chat request
    pub id: u64,
    pub name: String,
    pub parameters: Value,
    pub timestamp: DateTime<Utc>,
    pub status: ToolCallStatus,
}

/// `tool_result` event payload, paired with the call via `toolCallId`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultEvent {
    pub id: u64,
    #[serde(rename = "toolCallId")]
    pub tool_call_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One frame of the chat event stream.
///
/// The wire representation is `data: <json>\n\n` per frame, in emission
/// order, terminated by the literal `data: [DONE]\n\n` sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "text")]
    Text {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "tool_call")]
    ToolCall {
        #[serde(rename = "toolCall")]
        tool_call: ToolCallEvent,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(rename = "toolResult")]
        tool_result: ToolResultEvent,
    },
    #[serde(rename = "elicitation_request")]
    ElicitationRequest {
        #[serde(rename = "requestId")]
        request_id: String,
        message: String,
        schema: Value,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "elicitation_complete")]
    ElicitationComplete,
    /// Per-server validation failures for a request that still proceeded
    /// with its valid entries
    #[serde(rename = "server_config_errors")]
    ServerConfigErrors { errors: HashMap<String, String> },
    #[serde(rename = "error")]
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_event_wire_shape() {
        let event = StreamEvent::Text {
            content: "hello".to_string(),
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["content"], "hello");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn tool_events_use_camel_case_keys() {
        let event = StreamEvent::ToolResult {
            tool_result: ToolResultEvent {
                id: 3,
                tool_call_id: 3,
                result: Some(serde_json::json!({"ok": true})),
                error: None,
                timestamp: Utc::now(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["toolResult"]["toolCallId"], 3);
    }

    #[test]
    fn elicitation_request_carries_request_id() {
        let event = StreamEvent::ElicitationRequest {
            request_id: "elicit_1_abcdefghi".to_string(),
            message: "Pick a city".to_string(),
            schema: serde_json::json!({"type": "object"}),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "elicitation_request");
        assert_eq!(json["requestId"], "elicit_1_abcdefghi");
    }
}
