//! Logging initialization.
//!
//! Console output always, plus an optional daily-rolling file when a log
//! directory is configured. `RUST_LOG` overrides the configured level.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Emit JSON lines instead of the human-readable format
    pub json_format: bool,
    /// Write daily-rolling files here in addition to stdout
    pub log_dir: Option<String>,
    pub colorize: bool,
    pub log_file_name: String,
    /// Target prefix the default filter applies to
    pub log_target: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            log_dir: None,
            colorize: true,
            log_file_name: "mcp-inspector".to_string(),
            log_target: "mcp_inspector".to_string(),
        }
    }
}

/// Keeps the file appender's worker thread alive; hold it for the lifetime
/// of the process.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize tracing. Safe to call more than once (later calls are no-ops),
/// which keeps test binaries from fighting over the global subscriber.
pub fn init_logging(config: LoggingConfig) -> LogGuard {
    // Route `log` macros from dependencies into tracing
    let _ = LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={}",
            config.log_target,
            config.level.to_string().to_lowercase()
        ))
    });

    let mut layers = Vec::new();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.colorize)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::new(TIMESTAMP_FORMAT.to_string()));
    layers.push(if config.json_format {
        stdout_layer.json().flatten_event(true).boxed()
    } else {
        stdout_layer.boxed()
    });

    let mut file_guard = None;
    if let Some(log_dir) = &config.log_dir {
        let log_dir = PathBuf::from(log_dir);
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create log directory: {}", e);
        } else {
            let appender =
                RollingFileAppender::new(Rotation::DAILY, log_dir, config.log_file_name.clone());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::new(TIMESTAMP_FORMAT.to_string()))
                .with_writer(writer);
            layers.push(if config.json_format {
                file_layer.json().flatten_event(true).boxed()
            } else {
                file_layer.boxed()
            });
        }
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}
