pub mod config;
pub mod target;
pub mod types;

pub use config::{ConfigError, MonitorConfig, MIN_CHECK_INTERVAL, MIN_TIMEOUT};
pub use target::{validate_target, UrlError};
pub use types::*;
