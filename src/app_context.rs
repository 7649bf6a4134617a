//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ConfigError, ConfigResult};
use crate::mcp::ElicitationRegistry;

/// Application context holding shared resources.
///
/// Created once at startup and shared across all request handlers. The
/// elicitation registry lives here so its lifetime (and test isolation) is
/// explicit rather than hidden in module state.
pub struct AppContext {
    pub config: AppConfig,
    pub client: reqwest::Client,
    pub elicitations: Arc<ElicitationRegistry>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> ConfigResult<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Some(Duration::from_secs(50)))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::ValidationFailed {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            config,
            client,
            elicitations: Arc::new(ElicitationRegistry::new()),
        })
    }
}
