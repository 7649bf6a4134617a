//! Server assembly and startup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use crate::app_context::AppContext;
use crate::config::AppConfig;
use crate::logging::{self, LoggingConfig};
use crate::middleware::RequestIdLayer;
use crate::routers::{chat, connect, health, oauth, prompts, resources, tools};

/// Build the application router. Used by `startup` and by tests, which run
/// the same stack against their own context.
pub fn build_app(ctx: Arc<AppContext>) -> Router {
    let api = Router::new()
        .route("/health", get(health::api_health))
        .route("/chat", post(chat::chat))
        .route("/connect", post(connect::connect))
        .route("/tools/list", post(tools::list))
        .route("/tools/call", post(tools::call))
        .route("/resources/list", post(resources::list))
        .route("/resources/read", post(resources::read))
        .route("/prompts/list", post(prompts::list))
        .route("/prompts/get", post(prompts::get))
        .route("/oauth/metadata", get(oauth::metadata));

    let request_id_headers = ctx
        .config
        .request_id_headers
        .clone()
        .unwrap_or_else(RequestIdLayer::default_headers);

    let cors = build_cors_layer(&ctx.config);
    let max_payload_size = ctx.config.max_payload_size;

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/mcp", api)
        .fallback(fallback_handler)
        .layer(DefaultBodyLimit::max(max_payload_size))
        .layer(cors)
        .layer(RequestIdLayer::new(request_id_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn fallback_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Start the gateway and serve until interrupted
pub async fn startup(config: AppConfig) -> std::io::Result<()> {
    // Only initialize logging once, even when embedded in tests
    static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

    let _log_guard = if !LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        let level = config
            .log_level
            .as_deref()
            .and_then(|level| level.parse::<Level>().ok())
            .unwrap_or(Level::INFO);
        Some(logging::init_logging(LoggingConfig {
            level,
            log_dir: config.log_dir.clone(),
            ..Default::default()
        }))
    } else {
        None
    };

    info!("Initializing gateway on {}:{}", config.host, config.port);
    info!(
        "Max payload size: {} MB",
        config.max_payload_size / (1024 * 1024)
    );
    info!(
        "Elicitation timeout: {}s, max agent steps: {}",
        config.elicitation_timeout_secs, config.max_agent_steps
    );

    let host = config.host.clone();
    let port = config.port;

    let ctx = Arc::new(
        AppContext::new(config)
            .map_err(|e| std::io::Error::other(e.to_string()))?,
    );
    let app = build_app(ctx);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("Serving MCP Inspector API on {}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}
