//! Persisted job state.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitewatch_core::{JobConfig, ProbeOutcome};

/// Whether a recorded process id still refers to a running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Alive,
    Dead,
    /// The platform has no cheap way to tell.
    #[default]
    Unknown,
}

/// Registry record for one background job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub job_id: String,
    pub url: String,
    #[serde(rename = "pid")]
    pub process_id: u32,
    #[serde(rename = "log_file")]
    pub log_path: PathBuf,
    #[serde(rename = "pid_file")]
    pub registry_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub config: JobConfig,
    /// Filled in by `JobRegistry::list`; never written to disk.
    #[serde(skip)]
    pub liveness: Liveness,
}

/// One completed probe, as stored in a history log line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckEntry {
    /// Epoch seconds with sub-second precision.
    pub timestamp: f64,
    #[serde(default)]
    pub iso_time: Option<String>,
    pub url: String,
    #[serde(default)]
    pub status_code: Option<u16>,
    pub success: bool,
    /// Seconds. Zero when the probe never got a response.
    #[serde(default)]
    pub response_time: f64,
    #[serde(default)]
    pub error: Option<String>,
    /// The job's check interval when this entry was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

impl CheckEntry {
    pub fn from_outcome(outcome: &ProbeOutcome, interval: Option<u64>, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: epoch_secs_f64(at),
            iso_time: Some(at.to_rfc3339()),
            url: outcome.url.clone(),
            status_code: outcome.status_code,
            success: outcome.success,
            response_time: outcome.response_time.max(0.0),
            error: outcome.error.clone(),
            interval,
        }
    }

    /// Stamp an outcome with the current wall-clock time.
    pub fn now(outcome: &ProbeOutcome, interval: Option<u64>) -> Self {
        Self::from_outcome(outcome, interval, Utc::now())
    }
}

pub fn epoch_secs_f64(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> ProbeOutcome {
        ProbeOutcome {
            url: "https://example.com".to_string(),
            status_code: Some(200),
            success: true,
            response_time: 0.123,
            error: None,
        }
    }

    #[test]
    fn entry_carries_probe_fields_and_time() {
        let at = DateTime::from_timestamp(1_700_000_000, 500_000_000).unwrap();
        let entry = CheckEntry::from_outcome(&outcome(), Some(60), at);

        assert_eq!(entry.timestamp, 1_700_000_000.5);
        assert_eq!(entry.url, "https://example.com");
        assert_eq!(entry.status_code, Some(200));
        assert!(entry.success);
        assert_eq!(entry.interval, Some(60));
        assert!(entry.iso_time.unwrap().starts_with("2023-11-14T22:13:20"));
    }

    #[test]
    fn entry_parses_minimal_line() {
        let entry: CheckEntry =
            serde_json::from_str(r#"{"timestamp": 10.0, "url": "http://a", "success": false}"#)
                .unwrap();
        assert_eq!(entry.response_time, 0.0);
        assert_eq!(entry.status_code, None);
        assert_eq!(entry.interval, None);
    }

    #[test]
    fn record_never_persists_liveness() {
        let record = JobRecord {
            job_id: "j".to_string(),
            url: "http://a".to_string(),
            process_id: 42,
            log_path: PathBuf::from("/tmp/j.log"),
            registry_path: PathBuf::from("/tmp/monitor-job_j.pid"),
            started_at: DateTime::from_timestamp(0, 0).unwrap(),
            config: JobConfig {
                interval: 60,
                timeout: 10,
                webhook_url: None,
                webhook_payload: None,
                verify_ssl: true,
            },
            liveness: Liveness::Alive,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("liveness"));
        assert!(json.contains("\"pid\":42"));

        let back: JobRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.liveness, Liveness::Unknown);
    }
}
