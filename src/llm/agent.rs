//! Bounded tool-use loop.
//!
//! One `stream` call drives up to `max_steps` model turns: stream a turn,
//! execute any tool invocations it requested, append the results to the
//! transcript, re-enter. The loop stops when a turn requests no tools or
//! the step budget runs out.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::llm::client::ProviderClient;
use crate::llm::error::ProviderResult;
use crate::llm::{AgentMessage, ProviderEvent, ToolSpec, ToolUse};

/// Result of one tool invocation, fed back into the transcript
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

/// Executes tool invocations on behalf of the loop.
///
/// The relay's implementation emits `tool_call`/`tool_result` frames around
/// the real MCP invocation; the loop itself stays transport-agnostic.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolUse) -> ToolOutcome;
}

pub struct AgentRun<'a> {
    pub provider: &'a ProviderClient,
    pub system_prompt: Option<String>,
    pub max_steps: usize,
}

impl<'a> AgentRun<'a> {
    /// Drive the streaming loop. Returns whether any non-blank text was
    /// emitted, which the relay uses to decide on its one-shot fallback.
    pub async fn stream<F>(
        &self,
        mut transcript: Vec<AgentMessage>,
        tools: &[ToolSpec],
        executor: &dyn ToolExecutor,
        mut on_text: F,
    ) -> ProviderResult<bool>
    where
        F: FnMut(&str) + Send,
    {
        let system = self.system_prompt.as_deref();
        let mut has_content = false;

        for step in 0..self.max_steps {
            let mut events = self
                .provider
                .stream_step(system, &transcript, tools)
                .await?;

            let mut step_text = String::new();
            let mut calls: Vec<ToolUse> = Vec::new();

            while let Some(event) = events.recv().await {
                match event? {
                    ProviderEvent::TextDelta(chunk) => {
                        if !chunk.trim().is_empty() {
                            has_content = true;
                            on_text(&chunk);
                        }
                        step_text.push_str(&chunk);
                    }
                    ProviderEvent::ToolUse(call) => calls.push(call),
                    ProviderEvent::Finished => break,
                }
            }

            if calls.is_empty() {
                debug!(step, "Agent finished without tool calls");
                return Ok(has_content);
            }

            if step + 1 == self.max_steps {
                warn!(
                    steps = self.max_steps,
                    "Agent step budget exhausted with tool calls still pending"
                );
            }

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                results.push(executor.execute(call).await);
            }

            transcript.push(AgentMessage::ToolCalls {
                text: (!step_text.is_empty()).then_some(step_text),
                calls,
            });
            transcript.push(AgentMessage::ToolResults { results });
        }

        Ok(has_content)
    }

    /// One-shot completion used when streaming produced no text
    pub async fn generate(&self, transcript: Vec<AgentMessage>) -> ProviderResult<String> {
        self.provider
            .generate(self.system_prompt.as_deref(), &transcript)
            .await
    }
}
