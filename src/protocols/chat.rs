use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// LLM provider selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Anthropic,
    Openai,
    Ollama,
    Deepseek,
}

/// Model selection supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub id: String,
    pub provider: ModelProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Chat message roles accepted on input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One entry of the caller-supplied conversation history.
///
/// Callers may attach ids, timestamps and UI metadata; only role and content
/// matter to the relay, the rest is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Body of `POST /api/mcp/chat`.
///
/// Every field is optional at the serde level so that validation can produce
/// the per-field error messages the API promises instead of a blanket 422.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub server_configs: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub model: Option<ModelDefinition>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<IncomingMessage>>,
    #[serde(default)]
    pub ollama_base_url: Option<String>,
    /// Alternate control path: `"elicitation_response"`
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub response: Option<Value>,
}

pub const ACTION_ELICITATION_RESPONSE: &str = "elicitation_response";
