//! gridrender - submit frame-range render jobs to a grid cluster and fetch
//! the rendered images.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use gridrender_client::{JobServiceClient, StorageClient};
use gridrender_core::{
    ArtifactNaming, PollLimit, PollPolicy, RenderUnit, RunReport, ScriptTemplate, UnitOutcome,
};
use gridrender_remote::{CredentialProvider, SshChannel};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod json_output;
mod orchestrator;

use config::{Config, RunSettings};
use orchestrator::Orchestrator;

/// gridrender - grid render job runner
#[derive(Parser)]
#[command(name = "gridrender")]
#[command(about = "Submit render jobs to a grid cluster and fetch the frames", long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render all units and download their frames
    Run(RunArgs),

    /// Acquire (or re-issue) the grid proxy and report it
    #[command(name = "check-proxy")]
    CheckProxy,

    /// Print the batch script for one iteration
    Script {
        /// Iteration number (1-based)
        #[arg(short, long, default_value_t = 1)]
        iteration: u32,

        #[command(flatten)]
        template: TemplateArgs,
    },
}

#[derive(Args)]
struct TemplateArgs {
    /// Scene name (renders `<scene>.ini`, writes `<scene>NNN.png`)
    #[arg(long, default_value = "planet_00ani")]
    scene: String,

    /// Scheduler partition
    #[arg(long, default_value = "plgrid")]
    partition: String,

    /// Wall-clock limit per job
    #[arg(long, default_value = "02:00")]
    time_limit: String,
}

impl TemplateArgs {
    fn template(&self) -> ScriptTemplate {
        ScriptTemplate::default()
            .with_scene(&self.scene)
            .with_partition(&self.partition)
            .with_time_limit(&self.time_limit)
    }
}

#[derive(Args)]
struct RunArgs {
    /// Number of units; unit i renders frames 2i-1 and 2i
    #[arg(short, long, default_value_t = 10)]
    units: u32,

    /// Seconds between status checks
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_secs: u64,

    /// Status checks per job before giving up
    #[arg(long, default_value_t = 720, value_parser = clap::value_parser!(u32).range(1..))]
    max_poll_attempts: u32,

    /// Give up on a job after this many seconds instead of counting checks
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_deadline_secs: Option<u64>,

    /// Seconds between artifact downloads
    #[arg(long, default_value_t = 5)]
    download_interval_secs: u64,

    /// Directory for downloaded frames
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Re-issue the proxy when less than this many seconds are left
    #[arg(long, default_value_t = 600)]
    refresh_margin_secs: u64,

    /// Output events as JSON lines to stdout
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    template: TemplateArgs,
}

impl RunArgs {
    fn settings(&self) -> RunSettings {
        let limit = match self.poll_deadline_secs {
            Some(secs) => PollLimit::Deadline(Duration::from_secs(secs)),
            None => PollLimit::Attempts(self.max_poll_attempts),
        };
        RunSettings {
            units: self.units,
            poll: PollPolicy::new(Duration::from_secs(self.poll_interval_secs), limit),
            download_interval: Duration::from_secs(self.download_interval_secs),
            output_dir: self.output_dir.clone(),
            refresh_margin: Duration::from_secs(self.refresh_margin_secs),
            template: self.template.template(),
            naming: ArtifactNaming::new(&self.template.scene, "png"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for results and JSON events
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => {
            let report = run(args).await?;
            if !report.is_complete() {
                std::process::exit(2);
            }
        }
        Commands::CheckProxy => {
            check_proxy().await?;
        }
        Commands::Script {
            iteration,
            template,
        } => {
            let unit = RenderUnit::for_iteration(iteration)?;
            println!("{}", template.template().build_for(&unit));
        }
    }

    Ok(())
}

async fn run(args: RunArgs) -> Result<RunReport, Box<dyn std::error::Error>> {
    if args.json {
        json_output::enable_json_mode();
    }
    let config = Config::from_env()?;
    let settings = args.settings();

    info!(
        user = %config.username,
        host = %config.host,
        jobs_url = %config.jobs_url,
        units = settings.units,
        output_dir = %settings.output_dir.display(),
        "Starting gridrender"
    );

    tokio::fs::create_dir_all(&settings.output_dir).await?;

    let channel = SshChannel::connect(&config.ssh_target()).await?;
    let provider = CredentialProvider::new(channel).with_refresh_margin(settings.refresh_margin);

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()?;
    let jobs = JobServiceClient::with_client(http.clone(), &config.jobs_url);
    let storage = StorageClient::with_client(http, &config.data_url, &config.storage_dir());
    let base_request = config.job_request();

    let result = Orchestrator::new(&settings, &base_request, &jobs, &storage, &provider)
        .run()
        .await;

    if let Err(e) = provider.into_channel().close().await {
        warn!(error = %e, "Failed to close SSH session");
    }
    let report = result?;

    if !json_output::is_json_mode() {
        print_report(&report);
    }
    Ok(report)
}

async fn check_proxy() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let channel = SshChannel::connect(&config.ssh_target()).await?;
    let provider = CredentialProvider::new(channel);

    let result = provider.acquire().await;
    if let Err(e) = provider.into_channel().close().await {
        warn!(error = %e, "Failed to close SSH session");
    }
    let credential = result?;

    println!("Proxy:");
    println!("  Path:      {}", credential.path);
    println!("  Time left: {}", credential.timeleft);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Run summary:");
    for unit in &report.units {
        let job = unit
            .job_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        match &unit.outcome {
            UnitOutcome::Succeeded { fetched, failed } => println!(
                "  Unit {:>3} frames {:<9} job {:<24} OK ({} fetched, {} failed)",
                unit.unit.iteration,
                unit.unit.to_string(),
                job,
                fetched.len(),
                failed.len()
            ),
            UnitOutcome::Failed { reason } => println!(
                "  Unit {:>3} frames {:<9} job {:<24} FAILED: {}",
                unit.unit.iteration,
                unit.unit.to_string(),
                job,
                reason
            ),
        }
    }
    println!(
        "  {} succeeded, {} failed, {} artifacts fetched, {} artifacts missing",
        report.succeeded(),
        report.failed(),
        report.fetched_artifacts(),
        report.failed_artifacts()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["gridrender", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected run command");
        };
        let settings = args.settings();

        assert_eq!(settings.units, 10);
        assert_eq!(settings.poll, PollPolicy::default());
        assert_eq!(settings.download_interval, Duration::from_secs(5));
        assert_eq!(settings.naming.name_for(1), "planet_00ani001.png");
    }

    #[test]
    fn test_deadline_replaces_attempt_cap() {
        let cli = Cli::try_parse_from([
            "gridrender",
            "run",
            "--units",
            "3",
            "--poll-deadline-secs",
            "900",
            "--scene",
            "galaxy",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected run command");
        };
        let settings = args.settings();

        assert_eq!(settings.units, 3);
        assert_eq!(settings.poll.limit, PollLimit::Deadline(Duration::from_secs(900)));
        assert_eq!(settings.naming.name_for(12), "galaxy012.png");
        assert!(settings.template.build(1, 2).ends_with("galaxy.ini"));
    }

    #[test]
    fn test_zero_poll_settings_rejected() {
        for flag in ["--poll-interval-secs", "--max-poll-attempts", "--poll-deadline-secs"] {
            assert!(
                Cli::try_parse_from(["gridrender", "run", flag, "0"]).is_err(),
                "{flag} 0 should be rejected"
            );
        }
        assert!(Cli::try_parse_from(["gridrender", "run", "--max-poll-attempts", "1"]).is_ok());
    }
}
