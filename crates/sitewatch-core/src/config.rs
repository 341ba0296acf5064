//! Monitor configuration: built-in defaults, an optional TOML file and
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::JobConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SITEWATCH_CONFIG";

/// Environment variable overriding `data_dir`.
pub const DATA_DIR_ENV: &str = "SITEWATCH_DATA_DIR";

/// Shortest accepted check interval, seconds.
pub const MIN_CHECK_INTERVAL: u64 = 5;

/// Shortest accepted probe timeout, seconds.
pub const MIN_TIMEOUT: u64 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{field} is {value}, must be at least {min}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Status codes counted as a successful check.
    pub success_status_codes: Vec<u16>,
    /// Seconds between checks in watch mode.
    pub check_interval: u64,
    /// HTTP timeout in seconds.
    pub timeout: u64,
    pub user_agent: String,
    pub verify_ssl: bool,
    pub webhook_url: Option<String>,
    /// JSON template with `{url}`-style placeholders.
    pub webhook_payload: Option<String>,

    /// Base directory for registry records and history logs.
    pub data_dir: PathBuf,
    pub pid_file_prefix: String,
    /// Entries kept per history log; 0 disables trimming.
    pub max_log_entries: usize,
    /// Age in seconds after which a history log is rotated; 0 disables rotation.
    pub log_rotate_interval: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            success_status_codes: vec![200, 201, 202, 204],
            check_interval: 60,
            timeout: 10,
            user_agent: format!("sitewatch/{}", env!("CARGO_PKG_VERSION")),
            verify_ssl: true,
            webhook_url: None,
            webhook_payload: None,
            data_dir: default_data_dir(),
            pid_file_prefix: "monitor-job".to_string(),
            max_log_entries: 100,
            log_rotate_interval: 86_400,
        }
    }
}

impl MonitorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.job_config().validate()?;
        Ok(config)
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit path must exist. Otherwise `$SITEWATCH_CONFIG` is used
    /// when set, then `<default data dir>/config.toml` when present, then
    /// the built-in defaults. `$SITEWATCH_DATA_DIR` is applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => Self::from_file(Path::new(&path))?,
                None => {
                    let candidate = default_data_dir().join("config.toml");
                    if candidate.is_file() {
                        Self::from_file(&candidate)?
                    } else {
                        Self::default()
                    }
                }
            },
        };

        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// The per-job subset persisted in registry records.
    pub fn job_config(&self) -> JobConfig {
        JobConfig {
            interval: self.check_interval,
            timeout: self.timeout,
            webhook_url: self.webhook_url.clone(),
            webhook_payload: self.webhook_payload.clone(),
            verify_ssl: self.verify_ssl,
        }
    }

    /// Fold a persisted job config back into this one.
    pub fn apply_job_config(&mut self, job: &JobConfig) {
        self.check_interval = job.interval;
        self.timeout = job.timeout;
        self.webhook_url = job.webhook_url.clone();
        self.webhook_payload = job.webhook_payload.clone();
        self.verify_ssl = job.verify_ssl;
    }

    pub fn is_success_status(&self, code: u16) -> bool {
        self.success_status_codes.contains(&code)
    }
}

/// `~/.website-monitor`, or a relative directory when no home is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".website-monitor"))
        .unwrap_or_else(|| PathBuf::from(".website-monitor"))
}
