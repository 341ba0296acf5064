use anyhow::bail;

use sitewatch_core::{ConfigPatch, MonitorConfig};
use sitewatch_state::{JobRegistry, StateError};
use sitewatch_stats::StatsEngine;
use sitewatch_supervisor::Supervisor;

use crate::render::Output;
use crate::UpdateArgs;

pub fn status(config: &MonitorConfig, prune: bool) -> anyhow::Result<()> {
    let mut out = Output::stdout();
    let registry = JobRegistry::from_config(config);

    if prune {
        for job_id in registry.prune_dead()? {
            out.info(&format!("Removed record of exited job {job_id}"))?;
        }
    }

    let stats = StatsEngine::from_config(config);
    let rows: Vec<_> = registry
        .list()?
        .into_iter()
        .map(|record| {
            let job_stats = stats.compute(&record.job_id);
            (record, job_stats)
        })
        .collect();
    out.jobs(&rows)?;
    Ok(())
}

pub async fn stop(job: &str, config: &MonitorConfig) -> anyhow::Result<()> {
    let supervisor = Supervisor::from_config(config)?;
    if !supervisor.stop(job).await {
        bail!("failed to stop job {job} (not found or not running)");
    }
    Output::stdout().success(&format!("Job {job} stopped"))?;
    Ok(())
}

pub fn update(args: UpdateArgs, config: &MonitorConfig) -> anyhow::Result<()> {
    let patch = patch_from(&args);
    if patch.is_empty() {
        bail!(
            "no updates specified; provide at least one of --interval, --timeout, \
             --webhook-url, --webhook-payload, --verify-ssl/--no-verify"
        );
    }

    let registry = JobRegistry::from_config(config);
    let job_id = registry.resolve(&args.job);
    let mut out = Output::stdout();
    out.info(&format!("Updating job {}...", args.job))?;

    match registry.update(&job_id, &patch) {
        Ok(_) => {
            out.success(&format!("Job {} configuration updated", args.job))?;
            out.info("The running job picks up the change on its next cycle.")?;
            Ok(())
        }
        Err(StateError::NotFound(_)) => bail!("job not found: {}", args.job),
        Err(e) => Err(e.into()),
    }
}

fn patch_from(args: &UpdateArgs) -> ConfigPatch {
    let verify_ssl = if args.verify_ssl {
        Some(true)
    } else if args.no_verify {
        Some(false)
    } else {
        None
    };
    ConfigPatch {
        interval: args.interval,
        timeout: args.timeout,
        webhook_url: args.webhook_url.clone(),
        webhook_payload: args.webhook_payload.clone(),
        verify_ssl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse_update(extra: &[&str]) -> UpdateArgs {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: UpdateArgs,
        }
        let mut argv = vec!["update", "job_1"];
        argv.extend_from_slice(extra);
        Wrapper::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn no_flags_is_an_empty_patch() {
        assert!(patch_from(&parse_update(&[])).is_empty());
    }

    #[test]
    fn verify_flags_map_to_tristate() {
        assert_eq!(patch_from(&parse_update(&["--verify-ssl"])).verify_ssl, Some(true));
        assert_eq!(patch_from(&parse_update(&["--no-verify"])).verify_ssl, Some(false));
        assert_eq!(patch_from(&parse_update(&["-i", "60"])).verify_ssl, None);
    }

    #[test]
    fn empty_webhook_is_kept_for_clearing() {
        let patch = patch_from(&parse_update(&["-w", ""]));
        assert_eq!(patch.webhook_url.as_deref(), Some(""));
        assert!(!patch.is_empty());
    }

    #[test]
    fn update_of_unknown_job_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig {
            data_dir: dir.path().to_path_buf(),
            ..MonitorConfig::default()
        };
        let err = update(parse_update(&["-i", "60"]), &config).unwrap_err();
        assert!(err.to_string().contains("job not found"));
    }

    #[test]
    fn update_changes_only_the_given_field() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig {
            data_dir: dir.path().to_path_buf(),
            webhook_url: Some("https://hooks.example/a".to_string()),
            ..MonitorConfig::default()
        };
        let registry = JobRegistry::from_config(&config);
        let record = registry
            .create("https://example.com", 1, config.job_config())
            .unwrap();

        let mut args = parse_update(&["-i", "120"]);
        args.job = record.job_id.clone();
        update(args, &config).unwrap();

        let stored = registry.get(&record.job_id).unwrap().unwrap();
        assert_eq!(stored.config.interval, 120);
        assert_eq!(stored.config.timeout, config.timeout);
        assert_eq!(stored.config.webhook_url.as_deref(), Some("https://hooks.example/a"));
    }
}
