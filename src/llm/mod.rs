//! LLM provider adapters and the tool-use agent loop.
//!
//! Providers speak their native HTTP APIs over a shared `reqwest` client and
//! surface a unified event stream (text deltas, tool-use requests, a finish
//! marker). The agent loop in [`agent`] drives a bounded
//! stream/execute/resume cycle over whichever provider the request selected.

pub mod agent;
pub mod anthropic;
pub mod client;
pub mod error;
pub mod ollama;
pub mod openai;

pub use agent::{AgentRun, ToolExecutor, ToolOutcome};
pub use client::ProviderClient;
pub use error::{ProviderError, ProviderResult};

use serde_json::Value;

use crate::protocols::{IncomingMessage, MessageRole, ModelProvider};

/// A tool made available to the model
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone)]
pub struct ToolUse {
    /// Provider-assigned id when one exists, synthesized otherwise
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Unified stream events emitted by every provider adapter
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    TextDelta(String),
    ToolUse(ToolUse),
    Finished,
}

/// Internal conversation transcript the agent loop maintains.
///
/// Providers map these onto their own message shapes; tool calls and their
/// results travel as dedicated entries so each adapter can express them in
/// its native format.
#[derive(Debug, Clone)]
pub enum AgentMessage {
    Text {
        role: MessageRole,
        content: String,
    },
    /// One assistant turn that requested tool invocations
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolUse>,
    },
    /// The results fed back for the preceding `ToolCalls` turn
    ToolResults { results: Vec<agent::ToolOutcome> },
}

impl AgentMessage {
    pub fn from_incoming(messages: &[IncomingMessage]) -> Vec<Self> {
        messages
            .iter()
            .map(|m| AgentMessage::Text {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

/// Provider-specific sampling defaults, mirroring the model pickers the
/// inspector UI ships with.
pub fn default_temperature(provider: ModelProvider) -> f32 {
    match provider {
        ModelProvider::Anthropic => 1.0,
        ModelProvider::Openai => 0.7,
        ModelProvider::Deepseek => 1.3,
        ModelProvider::Ollama => 0.8,
    }
}
