//! Presentation. Every command writes through an [`Output`] it is handed,
//! so the detached watch process can run with a silent one.

use std::io::{self, Write};

use sitewatch_core::ProbeOutcome;
use sitewatch_state::{JobRecord, Liveness};
use sitewatch_stats::JobStats;

pub struct Output<W = Box<dyn Write>> {
    out: W,
}

impl Output {
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Discards everything.
    pub fn silent() -> Self {
        Self::new(Box::new(io::sink()))
    }
}

impl<W: Write> Output<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn info(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "info: {message}")
    }

    pub fn success(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "✓ {message}")
    }

    pub fn warning(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "warning: {message}")
    }

    pub fn check_result(&mut self, outcome: &ProbeOutcome) -> io::Result<()> {
        writeln!(self.out, "Check result for {}", outcome.url)?;
        row(&mut self.out, "Status code", &display_status(outcome.status_code))?;
        row(
            &mut self.out,
            "Status",
            if outcome.success { "up" } else { "DOWN" },
        )?;
        row(
            &mut self.out,
            "Response time",
            &format!("{:.3}s", outcome.response_time),
        )?;
        if let Some(error) = &outcome.error {
            row(&mut self.out, "Error", error)?;
        }
        Ok(())
    }

    /// Job table for `status`, one row per record with its uptime.
    pub fn jobs(&mut self, jobs: &[(JobRecord, JobStats)]) -> io::Result<()> {
        if jobs.is_empty() {
            return self.info("No background jobs found.");
        }

        writeln!(
            self.out,
            "{:<40} {:>8} {:<8} {:<23} {:>8}  URL",
            "JOB ID", "PID", "RUNNING", "STARTED", "UPTIME"
        )?;
        for (record, stats) in jobs {
            let uptime = if stats.empty_history {
                "N/A".to_string()
            } else {
                format!("{:.1}%", stats.uptime_pct)
            };
            writeln!(
                self.out,
                "{:<40} {:>8} {:<8} {:<23} {:>8}  {}",
                record.job_id,
                record.process_id,
                display_liveness(record.liveness),
                record.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                uptime,
                record.url,
            )?;
        }
        self.success(&format!(
            "Found {} job(s). Use 'details <job-id|pid>' for full stats.",
            jobs.len()
        ))
    }

    pub fn logs(&mut self, job: &str, tail: Option<&str>) -> io::Result<()> {
        self.info(&format!("Logs for job {job} (recent lines):"))?;
        match tail {
            Some(text) if !text.is_empty() => write!(self.out, "{text}"),
            _ => writeln!(self.out, "No log content."),
        }
    }

    /// Stats dashboard for `details`.
    pub fn job_details(&mut self, stats: &JobStats) -> io::Result<()> {
        let url = stats.url.as_deref().unwrap_or("N/A");
        writeln!(self.out, "Job {}", stats.job_id)?;
        row(&mut self.out, "URL", url)?;
        row(&mut self.out, "Started", &format_timestamp(stats.start_time))?;
        if let Some(liveness) = stats.liveness {
            row(&mut self.out, "Running", display_liveness(liveness))?;
        }

        if stats.empty_history {
            return self.warning(&format!(
                "Empty history (no checks logged yet) for job {}; wait one interval or check 'logs'.",
                stats.job_id
            ));
        }

        row(&mut self.out, "Next run", &format_timestamp(stats.next_run_time))?;
        row(
            &mut self.out,
            "Time since start",
            &format_duration(stats.time_since_start_seconds),
        )?;
        row(
            &mut self.out,
            "Next run in",
            &format_duration(stats.next_run_in_seconds),
        )?;
        row(&mut self.out, "Uptime", &format!("{:.2}%", stats.uptime_pct))?;
        row(&mut self.out, "Total checks", &stats.total_checks.to_string())?;
        row(&mut self.out, "Successes", &stats.success_count.to_string())?;
        row(&mut self.out, "Failures", &stats.failures.to_string())?;
        row(
            &mut self.out,
            "Avg response",
            &format!("{:.3}s", stats.avg_response_time),
        )?;
        row(&mut self.out, "Last ping", &format_timestamp(stats.last_ping))?;
        row(
            &mut self.out,
            "Period",
            &format!(
                "{} to {}",
                format_timestamp(stats.period_start),
                format_timestamp(stats.period_end)
            ),
        )
    }
}

fn row(out: &mut impl Write, label: &str, value: &str) -> io::Result<()> {
    writeln!(out, "  {label:<18} {value}")
}

fn display_status(code: Option<u16>) -> String {
    code.map_or_else(|| "N/A".to_string(), |c| c.to_string())
}

fn display_liveness(liveness: Liveness) -> &'static str {
    match liveness {
        Liveness::Alive => "yes",
        Liveness::Dead => "no",
        Liveness::Unknown => "unknown",
    }
}

/// Epoch seconds as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_timestamp(epoch_secs: Option<f64>) -> String {
    let Some(secs) = epoch_secs else {
        return "N/A".to_string();
    };
    chrono::DateTime::from_timestamp(secs.floor() as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Seconds as `2 days 3h 45m 12s`; always shows seconds under a minute.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "N/A".to_string();
    }
    let total = seconds as u64;
    let days = total / 86_400;
    let hours = total % 86_400 / 3600;
    let minutes = total % 3600 / 60;
    let secs = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days} day{}", if days == 1 { "" } else { "s" }));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }
    parts.join(" ")
}
