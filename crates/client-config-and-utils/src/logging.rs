//! Logging initialization.
//!
//! Thin wrapper over the observability package with the client's defaults.

use observability::{LogConfig, LogFormat};
use std::path::PathBuf;

/// Initialize logging for the MediSecure client.
///
/// `RUST_LOG` overrides `level`. `format` selects the stderr output
/// ("compact" or "json"). When `log_file` is set, every event is also
/// appended to it as JSONL.
pub fn init_logging(level: &str, format: &str, log_file: Option<PathBuf>) -> std::io::Result<()> {
    init_logging_for_service("medisecure", level, format, log_file)
}

/// Initialize logging with a custom service name.
pub fn init_logging_for_service(
    service_name: &str,
    level: &str,
    format: &str,
    log_file: Option<PathBuf>,
) -> std::io::Result<()> {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: log_file,
        also_stderr: true,
        format: LogFormat::parse(format),
    })
}
