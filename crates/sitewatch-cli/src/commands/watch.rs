use std::io;
use std::path::PathBuf;

use anyhow::Context;
use tokio::sync::watch;
use tracing::debug;

use sitewatch_core::{validate_target, MonitorConfig};
use sitewatch_health::{HttpProber, WebhookNotifier};
use sitewatch_state::{new_job_id, HistoryStore, JobRegistry};
use sitewatch_supervisor::{LoopEvent, RunLoop, Supervisor};

use crate::render::Output;
use crate::WatchArgs;

pub async fn watch(
    args: WatchArgs,
    mut config: MonitorConfig,
    config_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    apply_overrides(&args, &mut config);
    validate_target(&args.url).with_context(|| format!("cannot watch {}", args.url))?;

    if args.background {
        return start_background(&args.url, &config, config_file, args.max_checks);
    }

    // Only a detached child is handed its job id.
    let (job_id, mut out) = match args.job_id {
        Some(id) => (id, Output::silent()),
        None => (new_job_id(&args.url), Output::stdout()),
    };

    out.info(&format!(
        "Starting monitor for {} (interval: {}s)",
        args.url, config.check_interval
    ))?;
    if let Some(hook) = &config.webhook_url {
        out.info(&format!("Webhook configured: {hook}"))?;
    }
    out.info("Press Ctrl+C to stop")?;

    let shutdown_rx = shutdown_channel().context("failed to install signal handlers")?;

    let run_loop = RunLoop::new(
        HttpProber::from_config(&config),
        WebhookNotifier::new(),
        JobRegistry::from_config(&config),
        HistoryStore::from_config(&config),
    );
    let summary = run_loop
        .run(
            &job_id,
            &args.url,
            &config,
            args.max_checks,
            shutdown_rx,
            |event| {
                // Presentation failures must not stop monitoring.
                let _ = match event {
                    LoopEvent::Checked { outcome, .. } => out.check_result(outcome),
                    LoopEvent::Notified { outcome } if !outcome.success => out.warning(&format!(
                        "Webhook notification failed: {}",
                        outcome.error.as_deref().unwrap_or("unknown error")
                    )),
                    LoopEvent::Notified { .. } => Ok(()),
                };
            },
        )
        .await?;

    if summary.interrupted {
        out.info(&format!(
            "Monitoring stopped by user after {} checks",
            summary.checks_completed
        ))?;
    } else {
        out.success(&format!("Completed {} checks", summary.checks_completed))?;
    }
    Ok(())
}

/// Flips to `true` on Ctrl-C or SIGTERM, so `stop` lets the current check
/// and its history write finish before the loop exits.
#[cfg(unix)]
fn shutdown_channel() -> io::Result<watch::Receiver<bool>> {
    use tokio::signal::unix::{signal, SignalKind};

    let (tx, rx) = watch::channel(false);
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => debug!("interrupt received"),
            Some(()) = terminate.recv() => debug!("terminate received"),
            else => return,
        }
        let _ = tx.send(true);
    });
    Ok(rx)
}

#[cfg(not(unix))]
fn shutdown_channel() -> io::Result<watch::Receiver<bool>> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            let _ = tx.send(true);
        }
    });
    Ok(rx)
}

fn apply_overrides(args: &WatchArgs, config: &mut MonitorConfig) {
    if let Some(interval) = args.interval {
        config.check_interval = interval;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(hook) = &args.webhook_url {
        config.webhook_url = Some(hook.clone());
    }
    if let Some(payload) = &args.webhook_payload {
        config.webhook_payload = Some(payload.clone());
    }
    if args.no_verify {
        config.verify_ssl = false;
    }
}

fn start_background(
    url: &str,
    config: &MonitorConfig,
    config_file: Option<PathBuf>,
    max_checks: Option<u64>,
) -> anyhow::Result<()> {
    let mut out = Output::stdout();
    out.info(&format!("Starting background monitor for {url}"))?;

    let supervisor = Supervisor::from_config(config)?.with_config_file(config_file);
    let record = supervisor
        .start(url, config, max_checks)
        .context("failed to start background job")?;

    out.success(&format!(
        "Background job started: job_id={}, pid={}",
        record.job_id, record.process_id
    ))?;
    out.info(&format!("Log: {}", record.log_path.display()))?;
    if let Some(hook) = &record.config.webhook_url {
        out.info(&format!("Webhook configured: {hook}"))?;
    }
    out.info("Use 'status', 'details <job-id|pid>', 'logs <job-id|pid>' or 'stop <job-id|pid>'.")?;
    Ok(())
}
