use serde::{Deserialize, Serialize};

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Maximum payload size in bytes
    pub max_payload_size: usize,
    /// Timeout for outbound HTTP requests in seconds
    pub request_timeout_secs: u64,
    /// CORS allowed origins
    pub cors_allowed_origins: Vec<String>,
    /// Custom request ID headers to check (defaults to common headers)
    pub request_id_headers: Option<Vec<String>>,
    /// Log directory (None = stdout only)
    pub log_dir: Option<String>,
    /// Log level (None = info)
    pub log_level: Option<String>,
    /// How long a pending elicitation waits for a user answer, in seconds
    #[serde(default = "default_elicitation_timeout_secs")]
    pub elicitation_timeout_secs: u64,
    /// Maximum reasoning/tool steps per chat turn
    #[serde(default = "default_max_agent_steps")]
    pub max_agent_steps: usize,
    /// Base URL used when a chat request selects ollama without one
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
}

fn default_elicitation_timeout_secs() -> u64 {
    300
}

fn default_max_agent_steps() -> usize {
    10
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_payload_size: 16 * 1024 * 1024,
            request_timeout_secs: 600,
            cors_allowed_origins: vec![
                "http://localhost:8080".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:3001".to_string(),
            ],
            request_id_headers: None,
            log_dir: None,
            log_level: None,
            elicitation_timeout_secs: default_elicitation_timeout_secs(),
            max_agent_steps: default_max_agent_steps(),
            ollama_base_url: default_ollama_base_url(),
        }
    }
}

impl AppConfig {
    pub fn elicitation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.elicitation_timeout_secs)
    }
}
