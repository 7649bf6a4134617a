pub mod app_context;
pub mod config;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod middleware;
pub mod protocols;
pub mod routers;
pub mod server;
pub mod streaming;
