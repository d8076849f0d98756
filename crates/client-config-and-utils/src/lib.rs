//! Configuration, filesystem paths, and logging setup for the MediSecure client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, RefreshMode, RetryPolicy, DEFAULT_API_URL, DEFAULT_LOG_LEVEL, DEFAULT_REFRESH_PATH,
    DEFAULT_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service};
pub use paths::Paths;
