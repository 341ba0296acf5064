use anyhow::bail;

use sitewatch_core::MonitorConfig;
use sitewatch_state::{HistoryStore, JobRegistry};
use sitewatch_stats::StatsEngine;

use crate::render::Output;

/// Lines of raw log shown under the `details` dashboard.
const DETAILS_TAIL: usize = 5;

pub fn logs(job: &str, lines: usize, config: &MonitorConfig) -> anyhow::Result<()> {
    let job_id = JobRegistry::from_config(config).resolve(job);
    let Some(tail) = HistoryStore::from_config(config).tail(&job_id, lines)? else {
        bail!("no logs found for job {job}");
    };
    Output::stdout().logs(job, Some(&tail))?;
    Ok(())
}

pub fn details(job: &str, json: bool, config: &MonitorConfig) -> anyhow::Result<()> {
    let stats = StatsEngine::from_config(config).compute(job);
    // Nothing on record and nothing logged: the job never existed here.
    if stats.empty_history && stats.liveness.is_none() {
        bail!("job not found: {job}");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let mut out = Output::stdout();
    out.job_details(&stats)?;
    let tail = HistoryStore::from_config(config).tail(&stats.job_id, DETAILS_TAIL)?;
    out.logs(job, tail.as_deref())?;
    Ok(())
}
