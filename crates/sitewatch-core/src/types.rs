//! Plain data shared between the probe, the stores and the presentation layer.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, MIN_CHECK_INTERVAL, MIN_TIMEOUT};

/// Outcome of a single probe against a target URL.
///
/// Network failures never surface as errors: they are folded into
/// `success = false` with a populated `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeOutcome {
    pub url: String,
    pub status_code: Option<u16>,
    pub success: bool,
    /// Seconds, rounded to milliseconds.
    pub response_time: f64,
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// A failed outcome that never reached the network.
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            status_code: None,
            success: false,
            response_time: 0.0,
            error: Some(error.into()),
        }
    }
}

/// Per-job settings persisted in the registry record and re-read by the
/// running job before every cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    /// Seconds between checks.
    pub interval: u64,
    /// Probe timeout in seconds.
    pub timeout: u64,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_payload: Option<String>,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

impl JobConfig {
    /// Reject settings a watch process would refuse or spin on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval < MIN_CHECK_INTERVAL {
            return Err(ConfigError::OutOfRange {
                field: "check_interval",
                value: self.interval,
                min: MIN_CHECK_INTERVAL,
            });
        }
        if self.timeout < MIN_TIMEOUT {
            return Err(ConfigError::OutOfRange {
                field: "timeout",
                value: self.timeout,
                min: MIN_TIMEOUT,
            });
        }
        Ok(())
    }
}

fn default_verify_ssl() -> bool {
    true
}

/// A partial update to a [`JobConfig`]. Only `Some` fields are applied.
///
/// For the webhook fields an empty string clears the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub interval: Option<u64>,
    pub timeout: Option<u64>,
    pub webhook_url: Option<String>,
    pub webhook_payload: Option<String>,
    pub verify_ssl: Option<bool>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.interval.is_none()
            && self.timeout.is_none()
            && self.webhook_url.is_none()
            && self.webhook_payload.is_none()
            && self.verify_ssl.is_none()
    }

    /// Merge the set fields into `config`.
    pub fn apply_to(&self, config: &mut JobConfig) {
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(url) = &self.webhook_url {
            config.webhook_url = non_empty(url);
        }
        if let Some(payload) = &self.webhook_payload {
            config.webhook_payload = non_empty(payload);
        }
        if let Some(verify) = self.verify_ssl {
            config.verify_ssl = verify;
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
