use clap::Parser;
use mcp_inspector::config::AppConfig;
use mcp_inspector::server;

#[derive(Parser, Debug)]
#[command(name = "mcp-inspector")]
#[command(about = "HTTP gateway for inspecting and chatting with MCP servers")]
#[command(long_about = r#"
MCP Inspector API server.

Exposes the /api/mcp surface: a streaming chat relay that bridges LLM
providers and MCP tool servers, plus one-shot endpoints for connection
testing, tool, resource and prompt inspection.

Examples:
  # Defaults (0.0.0.0:3001)
  mcp-inspector

  # Custom bind address with file logging
  mcp-inspector --host 127.0.0.1 --port 8801 --log-dir ./logs
"#)]
struct CliArgs {
    /// Host address to bind the server
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the server
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Maximum request payload size in bytes
    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    max_payload_size: usize,

    /// Timeout for outbound HTTP requests in seconds
    #[arg(long, default_value_t = 600)]
    request_timeout_secs: u64,

    /// Allowed CORS origins (repeatable)
    #[arg(long, num_args = 0..)]
    cors_allowed_origins: Vec<String>,

    /// Directory to store log files (stdout only when omitted)
    #[arg(long)]
    log_dir: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds a pending elicitation waits for a user answer
    #[arg(long, default_value_t = 300)]
    elicitation_timeout_secs: u64,

    /// Maximum reasoning/tool steps per chat turn
    #[arg(long, default_value_t = 10)]
    max_agent_steps: usize,

    /// Default base URL for the ollama provider
    #[arg(long, default_value = "http://localhost:11434")]
    ollama_base_url: String,
}

impl CliArgs {
    fn into_config(self) -> AppConfig {
        let defaults = AppConfig::default();
        AppConfig {
            host: self.host,
            port: self.port,
            max_payload_size: self.max_payload_size,
            request_timeout_secs: self.request_timeout_secs,
            cors_allowed_origins: if self.cors_allowed_origins.is_empty() {
                defaults.cors_allowed_origins
            } else {
                self.cors_allowed_origins
            },
            request_id_headers: None,
            log_dir: self.log_dir,
            log_level: self.log_level,
            elicitation_timeout_secs: self.elicitation_timeout_secs,
            max_agent_steps: self.max_agent_steps,
            ollama_base_url: self.ollama_base_url,
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = CliArgs::parse().into_config();

    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    server::startup(config).await
}
