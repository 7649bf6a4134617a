use super::{AppConfig, ConfigError, ConfigResult};

impl AppConfig {
    /// Validate the configuration before startup
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "host".to_string(),
            });
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                value: "0".to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }

        if self.max_payload_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_payload_size".to_string(),
                value: "0".to_string(),
                reason: "payload limit must be non-zero".to_string(),
            });
        }

        if self.elicitation_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "elicitation_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "elicitation timeout must be non-zero".to_string(),
            });
        }

        if self.max_agent_steps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_agent_steps".to_string(),
                value: "0".to_string(),
                reason: "at least one agent step is required".to_string(),
            });
        }

        for origin in &self.cors_allowed_origins {
            if origin.parse::<axum::http::HeaderValue>().is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "cors_allowed_origins".to_string(),
                    value: origin.clone(),
                    reason: "origin is not a valid header value".to_string(),
                });
            }
        }

        if reqwest::Url::parse(&self.ollama_base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "ollama_base_url".to_string(),
                value: self.ollama_base_url.clone(),
                reason: "not a valid URL".to_string(),
            });
        }

        Ok(())
    }
}
