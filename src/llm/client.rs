//! Provider dispatch.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::llm::error::{ProviderError, ProviderResult};
use crate::llm::{
    anthropic, default_temperature, ollama, openai, AgentMessage, ProviderEvent, ToolSpec,
};
use crate::protocols::{ModelDefinition, ModelProvider};

#[derive(Debug, Clone)]
enum Backend {
    Anthropic { api_key: String, base_url: String },
    OpenAiCompat { api_key: String, base_url: String },
    Ollama { base_url: String },
}

/// One LLM back-end, resolved from the request's model selection
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    backend: Backend,
    model: String,
    temperature: f32,
}

impl ProviderClient {
    pub fn new(
        http: reqwest::Client,
        model: &ModelDefinition,
        api_key: &str,
        ollama_base_url: &str,
    ) -> ProviderResult<Self> {
        if model.id.is_empty() {
            return Err(ProviderError::InvalidModel(
                serde_json::to_string(model).unwrap_or_else(|_| "<unprintable>".to_string()),
            ));
        }

        let backend = match model.provider {
            ModelProvider::Anthropic => Backend::Anthropic {
                api_key: api_key.to_string(),
                base_url: anthropic::ANTHROPIC_BASE_URL.to_string(),
            },
            ModelProvider::Openai => Backend::OpenAiCompat {
                api_key: api_key.to_string(),
                base_url: openai::OPENAI_BASE_URL.to_string(),
            },
            ModelProvider::Deepseek => Backend::OpenAiCompat {
                api_key: api_key.to_string(),
                base_url: openai::DEEPSEEK_BASE_URL.to_string(),
            },
            ModelProvider::Ollama => Backend::Ollama {
                base_url: ollama_base_url.trim_end_matches('/').to_string(),
            },
        };

        Ok(Self {
            http,
            backend,
            model: model.id.clone(),
            temperature: default_temperature(model.provider),
        })
    }

    /// One streamed model turn: text deltas plus any tool-use requests
    pub async fn stream_step(
        &self,
        system: Option<&str>,
        transcript: &[AgentMessage],
        tools: &[ToolSpec],
    ) -> ProviderResult<mpsc::UnboundedReceiver<ProviderResult<ProviderEvent>>> {
        match &self.backend {
            Backend::Anthropic { api_key, base_url } => {
                anthropic::stream_step(
                    &self.http,
                    base_url,
                    api_key,
                    &self.model,
                    self.temperature,
                    system,
                    transcript,
                    tools,
                )
                .await
            }
            Backend::OpenAiCompat { api_key, base_url } => {
                openai::stream_step(
                    &self.http,
                    base_url,
                    api_key,
                    &self.model,
                    self.temperature,
                    system,
                    transcript,
                    tools,
                )
                .await
            }
            Backend::Ollama { base_url } => {
                ollama::stream_step(
                    &self.http,
                    base_url,
                    &self.model,
                    self.temperature,
                    system,
                    transcript,
                    tools,
                )
                .await
            }
        }
    }

    /// One-shot completion without tools, used as the empty-stream fallback
    pub async fn generate(
        &self,
        system: Option<&str>,
        transcript: &[AgentMessage],
    ) -> ProviderResult<String> {
        match &self.backend {
            Backend::Anthropic { api_key, base_url } => {
                anthropic::generate(
                    &self.http,
                    base_url,
                    api_key,
                    &self.model,
                    self.temperature,
                    system,
                    transcript,
                )
                .await
            }
            Backend::OpenAiCompat { api_key, base_url } => {
                openai::generate(
                    &self.http,
                    base_url,
                    api_key,
                    &self.model,
                    self.temperature,
                    system,
                    transcript,
                )
                .await
            }
            Backend::Ollama { base_url } => {
                ollama::generate(
                    &self.http,
                    base_url,
                    &self.model,
                    self.temperature,
                    system,
                    transcript,
                )
                .await
            }
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model
    }
}
