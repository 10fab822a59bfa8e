#![warn(missing_docs)]
//! Quadbench CLI Library
//!
//! Benchmarks how worker-pool size affects throughput of a fixed batch of
//! Monte Carlo integration tasks. One coordinator process feeds 20 tasks
//! through a bounded non-blocking channel pair to k worker processes, for
//! k = 1..=max_workers, and reports per-round results plus a final
//! `workers,total_time` table.

mod catalog;
mod config;
mod coordinator;
mod report;

pub use catalog::{Catalog, Task, N_TASKS, RANGES};
pub use config::{BenchConfig, RunnerConfig};
pub use coordinator::{
    Coordinator, CoordinatorError, RoundRecord, WorkerHandle, WorkerState, WORKER_FLAG,
};
pub use report::{format_round_header, format_round_table, format_timing_table};

use clap::Parser;
use quadbench_core::WorkerMain;
use quadbench_ipc::ChannelPair;
use std::io::Write;
use std::time::Duration;

/// Quadbench CLI arguments. Flags override `quadbench.toml` values.
#[derive(Parser, Debug)]
#[command(name = "quadbench")]
#[command(
    author,
    version,
    about = "quadbench - worker-pool scaling benchmark for Monte Carlo integration"
)]
pub struct Cli {
    /// Largest worker-pool size to test (rounds run k = 1..=max-workers)
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Monte Carlo samples per task
    #[arg(long, short = 'n')]
    pub samples: Option<u64>,

    /// Channel capacity in messages, for both queues
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Retry delay for non-blocking channel operations (e.g. "100ms")
    #[arg(long)]
    pub retry_delay: Option<String>,

    /// How long to wait for a signaled worker before force-killing it
    #[arg(long)]
    pub worker_timeout: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: run as a pool worker (used by the coordinator)
    #[arg(long, hide = true)]
    pub pool_worker: bool,
}

/// Effective settings after layering CLI flags over quadbench.toml.
#[derive(Debug, Clone)]
pub struct BenchSettings {
    /// Rounds run pool sizes 1..=max_workers.
    pub max_workers: usize,
    /// Monte Carlo samples per task.
    pub samples: u64,
    /// Channel capacity in messages.
    pub capacity: usize,
    /// Fixed delay between non-blocking channel retries.
    pub retry_delay: Duration,
    /// Bounded wait for cooperative worker exit.
    pub worker_timeout: Duration,
}

impl BenchSettings {
    /// Layer CLI flags over configuration file values.
    pub fn resolve(cli: &Cli, config: &BenchConfig) -> anyhow::Result<Self> {
        let retry_delay = BenchConfig::parse_duration(
            cli.retry_delay.as_deref().unwrap_or(&config.runner.retry_delay),
        )?;
        let worker_timeout = BenchConfig::parse_duration(
            cli.worker_timeout
                .as_deref()
                .unwrap_or(&config.runner.worker_timeout),
        )?;

        let settings = Self {
            max_workers: cli.max_workers.unwrap_or(config.runner.max_workers),
            samples: cli.samples.unwrap_or(config.runner.samples),
            capacity: cli.capacity.unwrap_or(config.runner.capacity),
            retry_delay,
            worker_timeout,
        };

        if settings.max_workers == 0 {
            return Err(anyhow::anyhow!("max-workers must be at least 1"));
        }
        if settings.samples == 0 {
            return Err(anyhow::anyhow!("samples must be at least 1"));
        }
        if settings.capacity == 0 {
            return Err(anyhow::anyhow!("capacity must be at least 1"));
        }

        Ok(settings)
    }
}

/// Run the quadbench CLI. This is the binary's entire entry point; any
/// returned error is printed to stderr and becomes a non-zero exit.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(Cli::parse())
}

/// Run with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Worker mode first, before any other initialization.
    if cli.pool_worker {
        return run_worker_mode();
    }

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("quadbench_cli=debug,quadbench_core=debug,quadbench_ipc=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("quadbench_cli=info,quadbench_core=info,quadbench_ipc=info")
            .init();
    }

    let config = BenchConfig::discover().unwrap_or_default();
    let settings = BenchSettings::resolve(&cli, &config)?;

    run_benchmark(&settings)
}

/// Run as a pool worker (spawned by the coordinator). Diagnostics go to
/// stderr, which stays attached to the coordinator's own. Channel-setup or
/// environment failures terminate the worker with a non-zero status.
fn run_worker_mode() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter("quadbench_core=info,quadbench_ipc=info")
        .init();

    let mut worker = WorkerMain::from_env()?;
    worker.run()?;
    Ok(())
}

/// Drive the full benchmark: one round per pool size, then the aggregate
/// timing table.
pub fn run_benchmark(settings: &BenchSettings) -> anyhow::Result<()> {
    let mut catalog = Catalog::build();
    let channels = ChannelPair::create(&std::process::id().to_string(), settings.capacity)?;
    let coordinator = Coordinator::new(
        channels,
        settings.retry_delay,
        settings.samples,
        settings.worker_timeout,
    );

    tracing::info!(
        tasks = catalog.len(),
        max_workers = settings.max_workers,
        samples = settings.samples,
        "starting benchmark"
    );

    let mut records = Vec::with_capacity(settings.max_workers);
    let mut out = std::io::stdout().lock();
    for worker_count in 1..=settings.max_workers {
        tracing::info!(worker_count, "starting round");
        let record = coordinator.run_round(&mut catalog, worker_count)?;
        out.write_all(format_round_header(worker_count).as_bytes())?;
        out.write_all(format_round_table(&catalog).as_bytes())?;
        out.flush()?;
        records.push(record);
    }

    out.write_all(format_timing_table(&records).as_bytes())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(args: &[&str]) -> Cli {
        let mut argv = vec!["quadbench"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn settings_default_to_reference_configuration() {
        let settings =
            BenchSettings::resolve(&cli_with(&[]), &BenchConfig::default()).unwrap();
        assert_eq!(settings.max_workers, 10);
        assert_eq!(settings.samples, 5_000_000);
        assert_eq!(settings.capacity, 2);
        assert_eq!(settings.retry_delay, Duration::from_millis(100));
    }

    #[test]
    fn cli_flags_override_config() {
        let cli = cli_with(&["--max-workers", "3", "-n", "1000", "--retry-delay", "5ms"]);
        let settings = BenchSettings::resolve(&cli, &BenchConfig::default()).unwrap();
        assert_eq!(settings.max_workers, 3);
        assert_eq!(settings.samples, 1_000);
        assert_eq!(settings.retry_delay, Duration::from_millis(5));
        // Untouched settings keep config values.
        assert_eq!(settings.capacity, 2);
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let cli = cli_with(&["--max-workers", "0"]);
        assert!(BenchSettings::resolve(&cli, &BenchConfig::default()).is_err());
    }

    #[test]
    fn worker_flag_matches_clap_definition() {
        let cli = cli_with(&[WORKER_FLAG]);
        assert!(cli.pool_worker);
    }
}
