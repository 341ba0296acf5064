//! Stats computation.

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use sitewatch_core::MonitorConfig;
use sitewatch_state::{
    epoch_secs_f64, probe_liveness, CheckEntry, HistoryStore, JobRecord, JobRegistry, Liveness,
};

/// Dashboard aggregates for one job.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobStats {
    pub job_id: String,
    /// First history entry's URL, else the registry record's.
    pub url: Option<String>,
    /// Registry start time, else the first check. Epoch seconds.
    pub start_time: Option<f64>,
    /// Liveness of the recorded process; `None` once the record is gone.
    pub liveness: Option<Liveness>,
    /// No parsable history entries exist yet.
    pub empty_history: bool,

    pub total_checks: usize,
    pub success_count: usize,
    pub failures: usize,
    pub uptime_pct: f64,
    /// Mean over checks with timing data, seconds.
    pub avg_response_time: f64,

    /// Earliest and latest check timestamps.
    pub period_start: Option<f64>,
    pub period_end: Option<f64>,
    /// Timestamp of the most recently written entry.
    pub last_ping: Option<f64>,
    /// Interval used for the next-run estimate, seconds.
    pub interval: u64,
    pub next_run_time: Option<f64>,
    pub time_since_start_seconds: f64,
    pub next_run_in_seconds: f64,
}

/// Computes [`JobStats`] on demand.
#[derive(Debug, Clone)]
pub struct StatsEngine {
    registry: JobRegistry,
    history: HistoryStore,
    default_interval: u64,
}

impl StatsEngine {
    pub fn new(registry: JobRegistry, history: HistoryStore, default_interval: u64) -> Self {
        Self {
            registry,
            history,
            default_interval,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            JobRegistry::from_config(config),
            HistoryStore::from_config(config),
            config.check_interval,
        )
    }

    /// Stats for a job addressed by job id or process id.
    pub fn compute(&self, identifier: &str) -> JobStats {
        let job_id = self.registry.resolve(identifier);

        let mut record = match self.registry.get(&job_id) {
            Ok(record) => record,
            Err(e) => {
                debug!(%job_id, error = %e, "job record unreadable, computing from history only");
                None
            }
        };
        if let Some(record) = record.as_mut() {
            record.liveness = probe_liveness(record.process_id);
        }

        let entries = self.history.read_all(&job_id);
        summarize(
            &job_id,
            record.as_ref(),
            &entries,
            self.default_interval,
            epoch_secs_f64(Utc::now()),
        )
    }
}

/// Fold a job's record and history into [`JobStats`] as of `now`.
pub fn summarize(
    job_id: &str,
    record: Option<&JobRecord>,
    entries: &[CheckEntry],
    default_interval: u64,
    now: f64,
) -> JobStats {
    let registered_start = record.map(|r| epoch_secs_f64(r.started_at));
    let liveness = record.map(|r| r.liveness);

    if entries.is_empty() {
        return JobStats {
            job_id: job_id.to_string(),
            url: record.map(|r| r.url.clone()),
            start_time: registered_start,
            liveness,
            empty_history: true,
            total_checks: 0,
            success_count: 0,
            failures: 0,
            uptime_pct: 0.0,
            avg_response_time: 0.0,
            period_start: None,
            period_end: None,
            last_ping: None,
            interval: record.map_or(default_interval, |r| r.config.interval),
            next_run_time: None,
            time_since_start_seconds: 0.0,
            next_run_in_seconds: 0.0,
        };
    }

    let total = entries.len();
    let successes = entries.iter().filter(|e| e.success).count();
    let uptime_pct = round_to(successes as f64 / total as f64 * 100.0, 2);

    let timed: Vec<f64> = entries
        .iter()
        .map(|e| e.response_time)
        .filter(|t| *t > 0.0)
        .collect();
    let avg_response_time = if timed.is_empty() {
        0.0
    } else {
        round_to(timed.iter().sum::<f64>() / timed.len() as f64, 3)
    };

    let mut stamps: Vec<f64> = entries.iter().map(|e| e.timestamp).collect();
    stamps.sort_by(f64::total_cmp);
    let first = stamps[0];
    let last = stamps[stamps.len() - 1];

    let interval = entries[total - 1]
        .interval
        .or_else(|| record.map(|r| r.config.interval))
        .unwrap_or(default_interval);
    let next_run = last + interval as f64;

    JobStats {
        job_id: job_id.to_string(),
        url: Some(entries[0].url.clone())
            .filter(|u| !u.is_empty())
            .or_else(|| record.map(|r| r.url.clone())),
        start_time: registered_start.or(Some(first)),
        liveness,
        empty_history: false,
        total_checks: total,
        success_count: successes,
        failures: total - successes,
        uptime_pct,
        avg_response_time,
        period_start: Some(first),
        period_end: Some(last),
        last_ping: Some(entries[total - 1].timestamp),
        interval,
        next_run_time: Some(next_run),
        time_since_start_seconds: (now - first).max(0.0),
        next_run_in_seconds: (next_run - now).max(0.0),
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
