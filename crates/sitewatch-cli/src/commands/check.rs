use std::time::Duration;

use anyhow::{bail, Context};

use sitewatch_core::{validate_target, MonitorConfig};
use sitewatch_health::{HttpProber, Prober};

use crate::render::Output;

/// One probe, printed and not recorded. Exits non-zero when the site is down.
pub async fn check(
    url: &str,
    timeout: Option<u64>,
    no_verify: bool,
    config: MonitorConfig,
) -> anyhow::Result<()> {
    validate_target(url).with_context(|| format!("cannot check {url}"))?;

    let timeout = Duration::from_secs(timeout.unwrap_or(config.timeout));
    let verify_ssl = config.verify_ssl && !no_verify;
    let outcome = HttpProber::from_config(&config)
        .probe(url, timeout, verify_ssl)
        .await;

    let mut out = Output::stdout();
    out.check_result(&outcome)?;
    if !outcome.success {
        bail!("website check failed for {url}");
    }
    out.success("Website is up and responding")?;
    Ok(())
}
