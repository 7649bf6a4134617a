//! MCP client plumbing for the gateway.
//!
//! Wraps the `rmcp` SDK: request-supplied server configs are validated and
//! mapped onto stdio/SSE/streamable-HTTP transports, one session is built
//! per API call, and server-initiated elicitation requests are bridged onto
//! the chat event stream through a keyed registry.

pub mod config;
pub mod elicitation;
pub mod error;
pub mod handler;
pub mod session;

pub use config::{
    normalize_server_name, validate_server_config, validate_server_configs, McpServerConfig,
    McpTransport, MultiValidation,
};
pub use elicitation::ElicitationRegistry;
pub use error::{McpError, McpResult};
pub use handler::{ElicitationSink, InspectorClientHandler};
pub use session::{McpSession, SessionTool};
