//! # Observability
//!
//! Centralized tracing setup for the MediSecure client workspace.
//!
//! Crates in this workspace are **log producers** only. They use the standard
//! `tracing` macros and never decide where output goes. A binary calls
//! [`init_with_config`] once at startup; library code and tests never do.
//!
//! Two sinks are available:
//!
//! - a human-readable stderr layer (compact or JSON lines), and
//! - an optional append-only JSONL file written by [`JsonLayer`], one object
//!   per event with `timestamp`, `level`, `service`, `pid`, `target`,
//!   `message` and structured `fields`.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "medisecure-cli".into(),
//!     default_level: "debug".into(),
//!     ..Default::default()
//! })?;
//! tracing::info!("ready");
//! ```

mod file_sink;
mod json_layer;

use std::io;
use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_sink::{FileLogWriter, WriterFactory};
pub use json_layer::{JsonLayer, LogEntry};

/// Output format for the stderr layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line, human readable.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse a format name. Unknown names fall back to [`LogFormat::Compact`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written into every JSONL entry.
    pub service_name: String,

    /// Default filter directive (e.g. "debug", "info,api_client=trace").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Optional JSONL log file. No file sink when `None`.
    pub log_path: Option<PathBuf>,

    /// Emit logs on stderr.
    pub also_stderr: bool,

    /// Format of the stderr layer.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
            format: LogFormat::Compact,
        }
    }
}

/// Initialize logging with default settings and the given service name.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize logging with custom configuration.
///
/// Returns an error only if the JSONL log file cannot be opened. A second
/// call in the same process is a no-op (the first subscriber stays installed).
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let file_layer = match &config.log_path {
        Some(path) => {
            let writer = FileLogWriter::new(path)?;
            Some(
                JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
                    .with_filter(env_filter(&config.default_level)),
            )
        }
        None => None,
    };

    let stderr_layer = config.also_stderr.then(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(true);
        match config.format {
            LogFormat::Compact => layer
                .compact()
                .with_filter(env_filter(&config.default_level))
                .boxed(),
            LogFormat::Json => layer
                .json()
                .with_filter(env_filter(&config.default_level))
                .boxed(),
        }
    });

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = ?config.log_path,
            "observability initialized"
        );
    }
    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn, Level};
