//! gpurm daemon
//!
//! Resource manager process: admits a batch of placed jobs, then runs
//! metrics rounds until every job has exited.

mod batch;

use anyhow::{bail, Context};
use batch::BatchFile;
use clap::Parser;
use gpurm_core::{LoggingConfig, ManagerConfig, SchedulingPolicy};
use gpurm_dispatcher::{Dispatcher, RoundDriver};
use gpurm_transport::GrpcNodeClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// gpurmd - resource manager for GPU cluster node managers
#[derive(Parser, Debug)]
#[command(name = "gpurmd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the JSON batch of placed jobs
    #[arg(long)]
    batch: PathBuf,

    /// Scheduling policy (FIFO or Optimus), overrides the config file
    #[arg(long)]
    policy: Option<SchedulingPolicy>,

    /// Round duration in seconds, overrides the config file
    #[arg(long)]
    round_duration: Option<f64>,

    /// Stop after this many rounds
    #[arg(long)]
    max_rounds: Option<u64>,

    /// Log level, overrides the config file
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    if config.format.eq_ignore_ascii_case("json") {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<ManagerConfig> {
    let mut config = match &args.config {
        Some(path) => ManagerConfig::from_file(path)?,
        None => ManagerConfig::default(),
    };

    if let Some(policy) = args.policy {
        config.policy.name = policy;
    }
    if let Some(round_duration) = args.round_duration {
        config.simulation.round_duration_secs = round_duration;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    let round_duration = config.simulation.round_duration_secs;
    if !round_duration.is_finite() || round_duration <= 0.0 {
        bail!("round duration must be a positive number of seconds, got {}", round_duration);
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging)?;

    info!("Starting gpurm daemon v{}", env!("CARGO_PKG_VERSION"));

    let batch = BatchFile::from_file(&args.batch)
        .with_context(|| format!("Failed to load batch {}", args.batch.display()))?;

    let client = Arc::new(GrpcNodeClient::new(&config.transport));
    let dispatcher = Dispatcher::from_config(client, &config)?;
    let round_duration = config.simulation.round_duration_secs;
    let mut driver = RoundDriver::new(dispatcher, round_duration);

    let (admissions, rejected) = batch.into_admissions();
    for failure in &rejected {
        warn!(job_id = %failure.job_id, error = %failure.error, "Rejected job description");
    }

    let admitted = driver.admit(admissions).await;
    info!(
        admitted = admitted.succeeded.len(),
        failed = admitted.failed.len() + rejected.len(),
        "Batch admitted"
    );

    while !driver.is_idle() {
        if args.max_rounds.is_some_and(|max| driver.round() >= max) {
            warn!(active = driver.active_jobs().len(), "Round limit reached");
            break;
        }

        // Live jobs progress in wall-clock time; simulated ones do not wait
        if driver.has_live_jobs() {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs_f64(round_duration)) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping");
                    break;
                }
            }
        }

        let summary = driver.run_round().await;
        for failure in &summary.failures {
            warn!(
                job_id = %failure.job_id,
                retryable = failure.error.is_retryable(),
                error = %failure.error,
                "Job failed this round"
            );
        }
        if !summary.retired.is_empty() {
            warn!(retired = ?summary.retired, "Dropped jobs that cannot make progress");
        }
    }

    info!(
        rounds = driver.round(),
        remaining = driver.active_jobs().len(),
        "gpurm daemon finished"
    );

    Ok(())
}
