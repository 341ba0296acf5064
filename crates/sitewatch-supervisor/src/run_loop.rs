//! The check loop run by every watch process, foreground or detached.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use sitewatch_core::{MonitorConfig, ProbeOutcome};
use sitewatch_health::{Notifier, Prober, WebhookOutcome};
use sitewatch_state::{CheckEntry, HistoryStore, JobRegistry};

use crate::error::SupervisorResult;

/// Progress reported to the caller while the loop runs.
#[derive(Debug)]
pub enum LoopEvent<'a> {
    /// A check finished and was written to history.
    Checked { number: u64, outcome: &'a ProbeOutcome },
    /// A failure webhook was attempted.
    Notified { outcome: &'a WebhookOutcome },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub checks_completed: u64,
    /// Ended by the shutdown signal rather than `max_checks`.
    pub interrupted: bool,
}

/// Probe, record and notify, on a fixed interval.
///
/// The job's registry record is re-read between checks so `update` takes
/// effect on the next cycle. Probe and webhook failures never end the
/// loop; failing to write history does.
pub struct RunLoop<P, N> {
    prober: P,
    notifier: N,
    registry: JobRegistry,
    history: HistoryStore,
}

impl<P: Prober, N: Notifier> RunLoop<P, N> {
    pub fn new(prober: P, notifier: N, registry: JobRegistry, history: HistoryStore) -> Self {
        Self {
            prober,
            notifier,
            registry,
            history,
        }
    }

    /// Run until `max_checks` checks are done or `shutdown` flips.
    ///
    /// The first check happens immediately. Shutdown is only observed
    /// between checks, so an in-flight check is always recorded. A config
    /// below the interval or timeout floor is refused up front.
    pub async fn run(
        &self,
        job_id: &str,
        url: &str,
        config: &MonitorConfig,
        max_checks: Option<u64>,
        mut shutdown: watch::Receiver<bool>,
        mut observe: impl FnMut(LoopEvent<'_>),
    ) -> SupervisorResult<RunSummary> {
        config.job_config().validate()?;
        let mut config = config.clone();
        let mut completed = 0u64;

        info!(%job_id, %url, interval = config.check_interval, ?max_checks, "check loop starting");

        let interrupted = loop {
            self.check_once(job_id, url, &config, completed + 1, &mut observe)
                .await?;
            completed += 1;

            if max_checks.is_some_and(|max| completed >= max) {
                break false;
            }

            self.reload_config(job_id, &mut config);

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(config.check_interval)) => {}
                Ok(()) = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!(%job_id, "check loop shutting down");
                        break true;
                    }
                }
            }
        };

        info!(%job_id, checks = completed, interrupted, "check loop finished");
        Ok(RunSummary {
            checks_completed: completed,
            interrupted,
        })
    }

    async fn check_once(
        &self,
        job_id: &str,
        url: &str,
        config: &MonitorConfig,
        number: u64,
        observe: &mut impl FnMut(LoopEvent<'_>),
    ) -> SupervisorResult<()> {
        let timeout = Duration::from_secs(config.timeout);
        let outcome = self.prober.probe(url, timeout, config.verify_ssl).await;

        let entry = CheckEntry::now(&outcome, Some(config.check_interval));
        if let Err(e) = self.history.append(job_id, &entry) {
            error!(%job_id, error = %e, "failed to write check history");
            return Err(e.into());
        }
        debug!(%job_id, number, success = outcome.success, status = ?outcome.status_code, "check recorded");
        observe(LoopEvent::Checked {
            number,
            outcome: &outcome,
        });

        if outcome.success {
            return Ok(());
        }
        let Some(hook) = config.webhook_url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(());
        };
        let sent = self
            .notifier
            .notify(&outcome, hook, config.webhook_payload.as_deref())
            .await;
        if !sent.success {
            debug!(%job_id, webhook = %hook, error = ?sent.error, "webhook notification failed");
        }
        observe(LoopEvent::Notified { outcome: &sent });
        Ok(())
    }

    fn reload_config(&self, job_id: &str, config: &mut MonitorConfig) {
        let Some(persisted) = self.registry.load_job_config(job_id) else {
            return;
        };
        if let Err(e) = persisted.validate() {
            warn!(%job_id, error = %e, "ignoring persisted job config");
            return;
        }
        if persisted != config.job_config() {
            info!(%job_id, interval = persisted.interval, timeout = persisted.timeout, "job config reloaded");
            config.apply_job_config(&persisted);
        }
    }
}
