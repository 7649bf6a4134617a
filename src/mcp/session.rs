//! Per-request MCP session.
//!
//! A session owns one rmcp client per configured server and lives for a
//! single API call: connect, operate, disconnect. Network transports retry
//! with exponential backoff; stdio transports fail fast.

use std::collections::HashMap;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use rmcp::{
    model::{CallToolRequestParam, CallToolResult, GetPromptRequestParam, ReadResourceRequestParam},
    service::RunningService,
    transport::{
        sse_client::SseClientConfig,
        streamable_http_client::StreamableHttpClientTransportConfig, ConfigureCommandExt,
        SseClientTransport, StreamableHttpClientTransport, TokioChildProcess,
    },
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::mcp::config::{normalize_server_name, McpServerConfig, McpTransport};
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::handler::{ElicitationSink, InspectorClientHandler};

type McpClient = RunningService<RoleClient, InspectorClientHandler>;

/// A discovered tool, qualified by the server that owns it
#[derive(Debug, Clone)]
pub struct SessionTool {
    /// `server__tool` as exposed to the model
    pub qualified_name: String,
    pub server: String,
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

pub fn format_tool_name(server: &str, tool: &str) -> String {
    format!("{}__{}", server, tool)
}

pub struct McpSession {
    clients: HashMap<String, McpClient>,
    // qualified tool name -> (server, plain tool name)
    tool_routes: HashMap<String, (String, String)>,
}

impl McpSession {
    /// Connect one client per named config, normalizing server names the way
    /// elicitation attribution expects. Any connection failure fails the
    /// whole session; callers report it before a stream is opened.
    pub async fn connect(
        configs: &HashMap<String, McpServerConfig>,
        sink: Option<ElicitationSink>,
    ) -> McpResult<Self> {
        let mut clients = HashMap::new();
        for (name, config) in configs {
            let normalized = normalize_server_name(name);
            let make_handler = {
                let normalized = normalized.clone();
                let sink = sink.clone();
                move || match &sink {
                    Some(sink) => InspectorClientHandler::relay(normalized.clone(), sink.clone()),
                    None => InspectorClientHandler::detached(normalized.clone()),
                }
            };
            let client = connect_server(&normalized, config, &make_handler).await?;
            clients.insert(normalized, client);
        }

        Ok(Self {
            clients,
            tool_routes: HashMap::new(),
        })
    }

    /// Convenience constructor for the one-shot endpoints, which address a
    /// single server under the fixed name `server`.
    pub async fn connect_single(config: &McpServerConfig) -> McpResult<Self> {
        let mut configs = HashMap::new();
        configs.insert("server".to_string(), config.clone());
        Self::connect(&configs, None).await
    }

    pub fn server_names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    fn client(&self, server: &str) -> McpResult<&McpClient> {
        self.clients
            .get(server)
            .ok_or_else(|| McpError::ServerNotFound(server.to_string()))
    }

    /// Discover tools across every connected server and record their routes
    /// for later invocation.
    pub async fn list_tools(&mut self) -> McpResult<Vec<SessionTool>> {
        let mut tools = Vec::new();
        for (server, client) in &self.clients {
            let discovered = client.peer().list_all_tools().await.map_err(|e| {
                McpError::ToolExecution(format!("Failed to list tools from '{}': {}", server, e))
            })?;
            debug!("Discovered {} tools from '{}'", discovered.len(), server);
            for tool in discovered {
                let name = tool.name.to_string();
                let qualified_name = format_tool_name(server, &name);
                self.tool_routes
                    .insert(qualified_name.clone(), (server.clone(), name.clone()));
                tools.push(SessionTool {
                    qualified_name,
                    server: server.clone(),
                    name,
                    description: tool.description.as_ref().map(|d| d.to_string()),
                    input_schema: Value::Object((*tool.input_schema).clone()),
                });
            }
        }
        Ok(tools)
    }

    /// Invoke a tool by its qualified `server__tool` name
    pub async fn call_tool(&self, qualified_name: &str, args: Value) -> McpResult<CallToolResult> {
        let (server, tool_name) = self
            .tool_routes
            .get(qualified_name)
            .cloned()
            .ok_or_else(|| McpError::ToolNotFound(qualified_name.to_string()))?;

        let client = self.client(&server)?;
        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(McpError::ToolExecution(format!(
                    "Tool arguments must be an object, got: {}",
                    other
                )))
            }
        };

        client
            .peer()
            .call_tool(CallToolRequestParam {
                name: tool_name.into(),
                arguments,
            })
            .await
            .map_err(|e| McpError::ToolExecution(format!("Failed to call tool: {}", e)))
    }

    /// Invoke a tool on a single-server session without prior discovery
    pub async fn call_tool_direct(
        &self,
        server: &str,
        tool_name: &str,
        args: Option<Value>,
    ) -> McpResult<CallToolResult> {
        let client = self.client(server)?;
        let arguments = match args {
            Some(Value::Object(map)) => Some(map),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(McpError::ToolExecution(format!(
                    "Tool arguments must be an object, got: {}",
                    other
                )))
            }
        };
        client
            .peer()
            .call_tool(CallToolRequestParam {
                name: tool_name.to_string().into(),
                arguments,
            })
            .await
            .map_err(|e| McpError::ToolExecution(format!("Failed to call tool: {}", e)))
    }

    pub async fn list_resources(&self, server: &str) -> McpResult<Value> {
        let client = self.client(server)?;
        let resources = client
            .peer()
            .list_all_resources()
            .await
            .map_err(|e| McpError::ResourceNotFound(format!("Failed to list resources: {}", e)))?;
        Ok(serde_json::to_value(resources).unwrap_or(Value::Null))
    }

    pub async fn read_resource(&self, server: &str, uri: &str) -> McpResult<Value> {
        let client = self.client(server)?;
        let content = client
            .peer()
            .read_resource(ReadResourceRequestParam {
                uri: uri.to_string(),
            })
            .await
            .map_err(|e| {
                McpError::ResourceNotFound(format!("Failed to read resource '{}': {}", uri, e))
            })?;
        Ok(serde_json::to_value(content).unwrap_or(Value::Null))
    }

    pub async fn list_prompts(&self, server: &str) -> McpResult<Value> {
        let client = self.client(server)?;
        let prompts = client
            .peer()
            .list_all_prompts()
            .await
            .map_err(|e| McpError::PromptNotFound(format!("Failed to list prompts: {}", e)))?;
        Ok(serde_json::to_value(prompts).unwrap_or(Value::Null))
    }

    pub async fn get_prompt(
        &self,
        server: &str,
        name: &str,
        args: Option<Value>,
    ) -> McpResult<Value> {
        let client = self.client(server)?;
        let arguments = match args {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };
        let content = client
            .peer()
            .get_prompt(GetPromptRequestParam {
                name: name.to_string(),
                arguments,
            })
            .await
            .map_err(|e| McpError::PromptNotFound(format!("Failed to get prompt '{}': {}", name, e)))?;
        Ok(serde_json::to_value(content).unwrap_or(Value::Null))
    }

    /// Disconnect every client. Failures are logged, never propagated, so a
    /// disconnect error cannot mask the request's real outcome.
    pub async fn shutdown(self) {
        for (server, client) in self.clients {
            if let Err(e) = client.cancel().await {
                warn!("Error disconnecting from server '{}': {}", server, e);
            }
        }
    }
}

/// Connect to an MCP server, retrying network transports with exponential
/// backoff. Stdio transports fail fast; a missing binary will not appear on
/// retry.
async fn connect_server(
    server_name: &str,
    config: &McpServerConfig,
    make_handler: &(dyn Fn() -> InspectorClientHandler + Sync),
) -> McpResult<McpClient> {
    let needs_retry = matches!(
        &config.transport,
        McpTransport::Sse { .. } | McpTransport::Streamable { .. }
    );
    if !needs_retry {
        return connect_server_impl(server_name, config, make_handler()).await;
    }

    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_secs(1))
        .with_max_interval(Duration::from_secs(10))
        .with_max_elapsed_time(Some(Duration::from_secs(30)))
        .build();

    backoff::future::retry(backoff, || async {
        match connect_server_impl(server_name, config, make_handler()).await {
            Ok(client) => Ok(client),
            Err(e) => {
                if is_permanent_error(&e) {
                    warn!(
                        "Permanent error connecting to '{}': {} - not retrying",
                        server_name, e
                    );
                    Err(backoff::Error::permanent(e))
                } else {
                    warn!("Failed to connect to '{}', retrying: {}", server_name, e);
                    Err(backoff::Error::transient(e))
                }
            }
        }
    })
    .await
}

fn is_permanent_error(error: &McpError) -> bool {
    match error {
        McpError::Config(_) => true,
        McpError::ServerNotFound(_) => true,
        McpError::Transport(_) => true,
        McpError::ConnectionFailed(msg) => {
            msg.contains("initialize")
                || msg.contains("connection closed")
                || msg.contains("connection refused")
                || msg.contains("invalid URL")
                || msg.contains("not found")
        }
        _ => false,
    }
}

async fn connect_server_impl(
    server_name: &str,
    config: &McpServerConfig,
    handler: InspectorClientHandler,
) -> McpResult<McpClient> {
    match &config.transport {
        McpTransport::Stdio {
            command,
            args,
            envs,
        } => {
            let transport = TokioChildProcess::new(
                tokio::process::Command::new(command).configure(|cmd| {
                    cmd.args(args)
                        .envs(envs.iter())
                        .stderr(std::process::Stdio::inherit());
                }),
            )
            .map_err(|e| McpError::Transport(format!("create stdio transport: {}", e)))?;

            let client = handler.serve(transport).await.map_err(|e| {
                McpError::ConnectionFailed(format!("initialize stdio client: {}", e))
            })?;

            info!("Connected to stdio server '{}'", server_name);
            Ok(client)
        }

        McpTransport::Sse { url, token } => {
            let http_client = build_http_client(token.as_deref())?;
            let cfg = SseClientConfig {
                sse_endpoint: url.clone().into(),
                ..Default::default()
            };

            let transport = SseClientTransport::start_with_client(http_client, cfg)
                .await
                .map_err(|e| McpError::Transport(format!("create SSE transport: {}", e)))?;

            let client = handler
                .serve(transport)
                .await
                .map_err(|e| McpError::ConnectionFailed(format!("initialize SSE client: {}", e)))?;

            info!("Connected to SSE server '{}' at {}", server_name, url);
            Ok(client)
        }

        McpTransport::Streamable { url, token } => {
            let transport = if let Some(token) = token {
                let mut cfg = StreamableHttpClientTransportConfig::with_uri(url.as_str());
                cfg.auth_header = Some(format!("Bearer {}", token));
                StreamableHttpClientTransport::from_config(cfg)
            } else {
                StreamableHttpClientTransport::from_uri(url.as_str())
            };

            let client = handler.serve(transport).await.map_err(|e| {
                McpError::ConnectionFailed(format!("initialize streamable client: {}", e))
            })?;

            info!(
                "Connected to streamable HTTP server '{}' at {}",
                server_name, url
            );
            Ok(client)
        }
    }
}

fn build_http_client(token: Option<&str>) -> McpResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10));

    if let Some(token) = token {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", token)
                .parse()
                .map_err(|e| McpError::Transport(format!("auth token: {}", e)))?,
        );
        builder = builder.default_headers(headers);
    }

    builder
        .build()
        .map_err(|e| McpError::Transport(format!("build HTTP client: {}", e)))
}
