//! sitewatch: HTTP availability monitor.
//!
//! # Usage
//!
//! ```text
//! sitewatch check https://example.com
//! sitewatch watch https://example.com --interval 30 --background
//! sitewatch status
//! sitewatch details <job-id|pid>
//! sitewatch stop <job-id|pid>
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitewatch_core::{MonitorConfig, MIN_CHECK_INTERVAL, MIN_TIMEOUT};

mod commands;
mod render;

#[derive(Parser)]
#[command(
    name = "sitewatch",
    about = "Website availability checks and background monitors",
    version,
    propagate_version = true
)]
struct Cli {
    /// Directory for job records and history logs.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML config file (default: $SITEWATCH_CONFIG, then <data dir>/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a URL once and print the result.
    #[command(visible_alias = "c")]
    Check {
        url: String,
        /// HTTP timeout in seconds.
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(MIN_TIMEOUT..))]
        timeout: Option<u64>,
        /// Skip TLS certificate verification.
        #[arg(long)]
        no_verify: bool,
    },
    /// Check a URL repeatedly, in the foreground or as a background job.
    #[command(visible_alias = "w")]
    Watch(WatchArgs),
    /// List background jobs.
    #[command(visible_alias = "s")]
    Status {
        /// Remove records of jobs whose process has exited.
        #[arg(long)]
        prune: bool,
    },
    /// Stop a background job.
    #[command(visible_alias = "st")]
    Stop {
        /// Job id or pid.
        job: String,
    },
    /// Show the most recent lines of a job's log.
    #[command(visible_alias = "l")]
    Logs {
        /// Job id or pid.
        job: String,
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },
    /// Cumulative stats dashboard for a job.
    #[command(visible_alias = "d")]
    Details {
        /// Job id or pid.
        job: String,
        /// Print the stats as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Change a running job's settings; it picks them up on its next cycle.
    #[command(visible_alias = "u")]
    Update(UpdateArgs),
}

#[derive(Args)]
pub struct WatchArgs {
    pub url: String,
    /// Seconds between checks.
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(MIN_CHECK_INTERVAL..))]
    pub interval: Option<u64>,
    /// HTTP timeout in seconds.
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(MIN_TIMEOUT..))]
    pub timeout: Option<u64>,
    /// Stop after this many checks.
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_checks: Option<u64>,
    /// Run detached and return immediately.
    #[arg(short, long)]
    pub background: bool,
    /// URL to POST to when a check fails.
    #[arg(short, long)]
    pub webhook_url: Option<String>,
    /// JSON template for the webhook body ({url}, {status_code}, {error}, {timestamp}, {response_time}).
    #[arg(long)]
    pub webhook_payload: Option<String>,
    /// Skip TLS certificate verification.
    #[arg(long)]
    pub no_verify: bool,
    /// Job id assigned by the parent of a background job.
    #[arg(long, hide = true)]
    pub job_id: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Job id or pid.
    pub job: String,
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(MIN_CHECK_INTERVAL..))]
    pub interval: Option<u64>,
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(MIN_TIMEOUT..))]
    pub timeout: Option<u64>,
    /// New webhook URL; "" clears it.
    #[arg(short, long)]
    pub webhook_url: Option<String>,
    /// New webhook template; "" clears it.
    #[arg(long)]
    pub webhook_payload: Option<String>,
    #[arg(long, conflicts_with = "no_verify")]
    pub verify_ssl: bool,
    #[arg(long)]
    pub no_verify: bool,
}

impl Cli {
    /// A detached job writes its stderr into its own history log, so keep
    /// it to warnings there.
    fn default_log_filter(&self) -> &'static str {
        match &self.command {
            Commands::Watch(WatchArgs { job_id: Some(_), .. }) => "warn",
            _ => "warn,sitewatch=info",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = MonitorConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Check {
            url,
            timeout,
            no_verify,
        } => commands::check::check(&url, timeout, no_verify, config).await,
        Commands::Watch(args) => commands::watch::watch(args, config, cli.config).await,
        Commands::Status { prune } => commands::jobs::status(&config, prune),
        Commands::Stop { job } => commands::jobs::stop(&job, &config).await,
        Commands::Logs { job, lines } => commands::history::logs(&job, lines, &config),
        Commands::Details { job, json } => commands::history::details(&job, json, &config),
        Commands::Update(args) => commands::jobs::update(args, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn aliases_resolve() {
        let cli = Cli::try_parse_from(["sitewatch", "st", "1234"]).unwrap();
        assert!(matches!(cli.command, Commands::Stop { job } if job == "1234"));

        let cli = Cli::try_parse_from(["sitewatch", "l", "job_1", "-n", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Logs { lines: 5, .. }));
    }

    #[test]
    fn watch_interval_has_a_floor() {
        assert!(Cli::try_parse_from(["sitewatch", "watch", "https://example.com", "-i", "4"]).is_err());
        assert!(Cli::try_parse_from(["sitewatch", "watch", "https://example.com", "-i", "5"]).is_ok());
    }

    #[test]
    fn background_child_logs_warnings_only() {
        let cli = Cli::try_parse_from([
            "sitewatch",
            "watch",
            "https://example.com",
            "--job-id",
            "job_1",
            "--data-dir",
            "/tmp/x",
        ])
        .unwrap();
        assert_eq!(cli.default_log_filter(), "warn");
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn background_child_arguments_parse() {
        use sitewatch_state::JobRegistry;
        use sitewatch_supervisor::{DetachedLauncher, Supervisor};

        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::new(
            JobRegistry::new(dir.path(), "monitor-job"),
            DetachedLauncher,
            "sitewatch",
        )
        .with_config_file(Some(PathBuf::from("/etc/sitewatch.toml")));
        let job = sitewatch_core::JobConfig {
            interval: MIN_CHECK_INTERVAL,
            timeout: MIN_TIMEOUT,
            webhook_url: Some("https://hooks.example/x".to_string()),
            webhook_payload: Some(r#"{"u":"{url}"}"#.to_string()),
            verify_ssl: false,
        };

        let mut argv = vec!["sitewatch".to_string()];
        argv.extend(supervisor.watch_args("https://example.com", "job_1", &job, Some(1)));
        let cli = Cli::try_parse_from(argv).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/sitewatch.toml")));
        assert_eq!(cli.data_dir.as_deref(), Some(dir.path()));
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.interval, Some(MIN_CHECK_INTERVAL));
        assert_eq!(args.timeout, Some(MIN_TIMEOUT));
        assert_eq!(args.max_checks, Some(1));
        assert_eq!(args.job_id.as_deref(), Some("job_1"));
        assert_eq!(args.webhook_payload.as_deref(), Some(r#"{"u":"{url}"}"#));
        assert!(args.no_verify);
        assert!(!args.background);

        let mut defaults = vec!["sitewatch".to_string()];
        defaults.extend(supervisor.watch_args(
            "https://example.com",
            "job_2",
            &MonitorConfig::default().job_config(),
            None,
        ));
        assert!(Cli::try_parse_from(defaults).is_ok());
    }

    #[test]
    fn update_verify_flags_conflict() {
        assert!(Cli::try_parse_from(["sitewatch", "u", "job_1", "--verify-ssl", "--no-verify"]).is_err());
    }
}
