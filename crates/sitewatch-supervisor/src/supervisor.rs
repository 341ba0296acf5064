//! Supervisor: starts jobs as detached processes and stops them by signal.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use sitewatch_core::{validate_target, JobConfig, MonitorConfig};
use sitewatch_state::history::history_path;
use sitewatch_state::{
    new_job_id, probe_liveness, send_signal, JobRecord, JobRegistry, Liveness, Signal,
};

use crate::error::{SupervisorError, SupervisorResult};
use crate::launcher::{DetachedLauncher, LaunchSpec, ProcessLauncher};

/// Time between SIGTERM and the follow-up SIGKILL.
pub const STOP_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle of a background job, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Created,
    Spawning,
    Running,
    Stopping,
    Stopped,
    Crashed,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Created => "created",
            JobPhase::Spawning => "spawning",
            JobPhase::Running => "running",
            JobPhase::Stopping => "stopping",
            JobPhase::Stopped => "stopped",
            JobPhase::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

/// Starts and stops background jobs.
///
/// A started job re-invokes `program watch <url> --job-id <id> ...`; the
/// job id is allocated here, once, so the parent's record and the child's
/// history always share it.
pub struct Supervisor<L = DetachedLauncher> {
    registry: JobRegistry,
    launcher: L,
    program: PathBuf,
    config_file: Option<PathBuf>,
    grace: Duration,
}

impl Supervisor<DetachedLauncher> {
    /// Supervisor that relaunches the running executable.
    pub fn from_config(config: &MonitorConfig) -> SupervisorResult<Self> {
        let program = std::env::current_exe().map_err(SupervisorError::Spawn)?;
        Ok(Self::new(
            JobRegistry::from_config(config),
            DetachedLauncher,
            program,
        ))
    }
}

impl<L: ProcessLauncher> Supervisor<L> {
    pub fn new(registry: JobRegistry, launcher: L, program: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            launcher,
            program: program.into(),
            config_file: None,
            grace: STOP_GRACE,
        }
    }

    /// Config file the child should load, forwarded as `--config`.
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Validate `url` and the job config, spawn a detached watch process
    /// for it and register it. `max_checks` is forwarded to the child.
    pub fn start(
        &self,
        url: &str,
        config: &MonitorConfig,
        max_checks: Option<u64>,
    ) -> SupervisorResult<JobRecord> {
        validate_target(url)?;

        let job = config.job_config();
        job.validate()?;
        let job_id = new_job_id(url);
        debug!(%job_id, %url, phase = %JobPhase::Created, "job created");

        self.registry.ensure_dir()?;
        let spec = LaunchSpec {
            program: self.program.clone(),
            args: self.watch_args(url, &job_id, &job, max_checks),
            output: history_path(self.registry.dir(), &job_id),
        };

        debug!(%job_id, phase = %JobPhase::Spawning, program = ?spec.program, "spawning job process");
        let pid = self.launcher.spawn(&spec).map_err(SupervisorError::Spawn)?;

        let record = self.registry.new_record(&job_id, url, pid, job);
        if let Err(e) = self.registry.register(&record) {
            // An unregistered job could never be stopped through us.
            warn!(%job_id, pid, error = %e, "failed to register job, terminating it");
            let _ = send_signal(pid, Signal::Terminate);
            return Err(e.into());
        }

        info!(%job_id, pid, %url, phase = %JobPhase::Running, "background job started");
        Ok(record)
    }

    /// Arguments that make the child run the watch loop in the foreground
    /// under the given job id.
    pub fn watch_args(
        &self,
        url: &str,
        job_id: &str,
        job: &JobConfig,
        max_checks: Option<u64>,
    ) -> Vec<String> {
        let mut args = vec![
            "watch".to_string(),
            url.to_string(),
            "--interval".to_string(),
            job.interval.to_string(),
            "--timeout".to_string(),
            job.timeout.to_string(),
            "--job-id".to_string(),
            job_id.to_string(),
            "--data-dir".to_string(),
            self.registry.dir().display().to_string(),
        ];
        if let Some(n) = max_checks {
            args.push("--max-checks".to_string());
            args.push(n.to_string());
        }
        if let Some(hook) = &job.webhook_url {
            args.push("--webhook-url".to_string());
            args.push(hook.clone());
        }
        if let Some(payload) = &job.webhook_payload {
            args.push("--webhook-payload".to_string());
            args.push(payload.clone());
        }
        if !job.verify_ssl {
            args.push("--no-verify".to_string());
        }
        if let Some(path) = &self.config_file {
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        args
    }

    /// Stop a job by job id or pid. `false` when it is unknown or could not
    /// be signalled; the record is removed either way once found.
    pub async fn stop(&self, identifier: &str) -> bool {
        match self.try_stop(identifier).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%identifier, error = %e, "stop failed");
                false
            }
        }
    }

    pub async fn try_stop(&self, identifier: &str) -> SupervisorResult<()> {
        let job_id = self.registry.resolve(identifier);
        let record = self
            .registry
            .get(&job_id)?
            .ok_or_else(|| SupervisorError::NotFound(identifier.to_string()))?;
        let pid = record.process_id;

        info!(%job_id, pid, phase = %JobPhase::Stopping, "stopping job");
        let terminated = send_signal(pid, Signal::Terminate);
        match &terminated {
            Ok(()) => {
                tokio::time::sleep(self.grace).await;
                if probe_liveness(pid) == Liveness::Alive {
                    debug!(%job_id, pid, "still alive after grace period, killing");
                    if let Err(e) = send_signal(pid, Signal::Kill) {
                        debug!(%job_id, pid, error = %e, "kill failed");
                    }
                }
            }
            Err(e) => {
                warn!(%job_id, pid, error = %e, phase = %JobPhase::Crashed, "could not signal job process");
            }
        }

        self.registry.delete(&job_id)?;

        terminated.map_err(|source| SupervisorError::ProcessControl { pid, source })?;
        info!(%job_id, pid, phase = %JobPhase::Stopped, "job stopped");
        Ok(())
    }
}
