//! Request-supplied MCP server configuration.
//!
//! Callers describe servers as loose JSON objects; each entry is validated
//! independently so one malformed server never takes down its siblings.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Transport descriptor resolved from a request config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpTransport {
    Stdio {
        command: String,
        args: Vec<String>,
        envs: HashMap<String, String>,
    },
    Sse {
        url: String,
        token: Option<String>,
    },
    Streamable {
        url: String,
        token: Option<String>,
    },
}

/// A validated server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerConfig {
    pub transport: McpTransport,
}

/// Raw wire shape accepted from callers
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServerConfig {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Option<Vec<String>>,
    #[serde(default)]
    env: Option<HashMap<String, String>>,
    #[serde(default)]
    request_init: Option<RawRequestInit>,
    #[serde(default)]
    oauth: Option<RawOAuth>,
}

#[derive(Debug, Deserialize)]
struct RawRequestInit {
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct RawOAuth {
    #[serde(default)]
    access_token: Option<String>,
}

/// Outcome of validating a named map of server configs.
///
/// Valid entries proceed; failures are reported per server name.
#[derive(Debug, Default)]
pub struct MultiValidation {
    pub valid: HashMap<String, McpServerConfig>,
    pub errors: HashMap<String, String>,
}

impl MultiValidation {
    pub fn all_failed(&self) -> bool {
        self.valid.is_empty()
    }
}

/// Normalize a server config name the way handler registration expects:
/// lower-cased, space/hyphen runs collapsed to a single underscore, any
/// other non-alphanumerics dropped.
pub fn normalize_server_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut in_separator = false;
    for ch in lower.chars() {
        if ch.is_whitespace() || ch == '-' {
            if !in_separator {
                out.push('_');
                in_separator = true;
            }
            continue;
        }
        in_separator = false;
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        }
    }
    out
}

/// Validate a single server configuration value
pub fn validate_server_config(value: &Value) -> Result<McpServerConfig, String> {
    if value.is_null() {
        return Err("Server configuration is required".to_string());
    }

    let raw: RawServerConfig = serde_json::from_value(value.clone())
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    if let Some(url) = raw.url {
        let mut parsed =
            reqwest::Url::parse(&url).map_err(|e| format!("Invalid URL format: {}", e))?;
        // Strip query/hash; transports re-add their own parameters
        parsed.set_query(None);
        parsed.set_fragment(None);

        let token = raw
            .oauth
            .and_then(|oauth| oauth.access_token)
            .or_else(|| {
                raw.request_init.as_ref().and_then(|init| {
                    init.headers.as_ref().and_then(|headers| {
                        headers
                            .iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case("authorization"))
                            .map(|(_, v)| v.trim_start_matches("Bearer ").to_string())
                    })
                })
            })
            .filter(|token| !token.is_empty());

        let url = parsed.to_string();
        let transport = if url.trim_end_matches('/').ends_with("/sse") {
            McpTransport::Sse { url, token }
        } else {
            McpTransport::Streamable { url, token }
        };
        return Ok(McpServerConfig { transport });
    }

    if let Some(command) = raw.command {
        if command.trim().is_empty() {
            return Err("Command must not be empty".to_string());
        }
        return Ok(McpServerConfig {
            transport: McpTransport::Stdio {
                command,
                args: raw.args.unwrap_or_default(),
                envs: raw.env.unwrap_or_default(),
            },
        });
    }

    Err("Server configuration must include a url or a command".to_string())
}

/// Validate every entry of a named config map independently
pub fn validate_server_configs(configs: &HashMap<String, Value>) -> MultiValidation {
    let mut outcome = MultiValidation::default();
    for (name, value) in configs {
        match validate_server_config(value) {
            Ok(config) => {
                outcome.valid.insert(name.clone(), config);
            }
            Err(message) => {
                outcome.errors.insert(name.clone(), message);
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_spaces_and_punctuation() {
        assert_eq!(normalize_server_name("My Server!"), "my_server");
        assert_eq!(normalize_server_name("weather-api v2"), "weather_api_v2");
        assert_eq!(normalize_server_name("Already_fine"), "already_fine");
        assert_eq!(normalize_server_name("spaced   out"), "spaced_out");
    }

    #[test]
    fn url_config_strips_query_and_hash() {
        let config = validate_server_config(&json!({
            "url": "https://mcp.example.com/api?session=abc#frag"
        }))
        .unwrap();
        match config.transport {
            McpTransport::Streamable { url, token } => {
                assert_eq!(url, "https://mcp.example.com/api");
                assert!(token.is_none());
            }
            other => panic!("unexpected transport: {:?}", other),
        }
    }

    #[test]
    fn sse_suffix_selects_sse_transport() {
        let config = validate_server_config(&json!({
            "url": "https://mcp.example.com/sse",
            "oauth": { "access_token": "tok123" }
        }))
        .unwrap();
        match config.transport {
            McpTransport::Sse { url, token } => {
                assert_eq!(url, "https://mcp.example.com/sse");
                assert_eq!(token.as_deref(), Some("tok123"));
            }
            other => panic!("unexpected transport: {:?}", other),
        }
    }

    #[test]
    fn bearer_header_is_picked_up_as_token() {
        let config = validate_server_config(&json!({
            "url": "https://mcp.example.com/api",
            "requestInit": { "headers": { "Authorization": "Bearer tok456" } }
        }))
        .unwrap();
        match config.transport {
            McpTransport::Streamable { token, .. } => {
                assert_eq!(token.as_deref(), Some("tok456"))
            }
            other => panic!("unexpected transport: {:?}", other),
        }
    }

    #[test]
    fn stdio_config_is_accepted() {
        let config = validate_server_config(&json!({
            "command": "uvx",
            "args": ["weather-server"],
            "env": { "API_KEY": "k" }
        }))
        .unwrap();
        assert!(matches!(config.transport, McpTransport::Stdio { .. }));
    }

    #[test]
    fn invalid_url_is_rejected_with_message() {
        let err = validate_server_config(&json!({ "url": "not a url" })).unwrap_err();
        assert!(err.starts_with("Invalid URL format"));
    }

    #[test]
    fn missing_url_and_command_is_rejected() {
        let err = validate_server_config(&json!({})).unwrap_err();
        assert!(err.contains("url or a command"));
    }

    #[test]
    fn partial_validation_keeps_valid_entries() {
        let configs = HashMap::from([
            (
                "good".to_string(),
                json!({ "url": "https://mcp.example.com/api" }),
            ),
            ("bad".to_string(), json!({ "url": "::::" })),
        ]);

        let outcome = validate_server_configs(&configs);
        assert_eq!(outcome.valid.len(), 1);
        assert!(outcome.valid.contains_key("good"));
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors.contains_key("bad"));
        assert!(!outcome.all_failed());
    }

    #[test]
    fn all_invalid_is_flagged() {
        let configs = HashMap::from([("bad".to_string(), json!({}))]);
        assert!(validate_server_configs(&configs).all_failed());
    }
}
