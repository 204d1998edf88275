use anyhow::{Context, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use testbed_bench_workflow::domain::experiment::driver::{DriverOptions, ExperimentDriver};
use testbed_bench_workflow::domain::provisioner::g5k::g5k_scheduler::G5kScheduler;
use testbed_bench_workflow::domain::provisioner::reservation::Reservation;
use testbed_bench_workflow::domain::remote::ssh::SshClient;
use testbed_bench_workflow::domain::utils::id::HostName;
use testbed_bench_workflow::{load_experiment, logger};

/// Deploys AntidoteDB and FMKe on Grid'5000 nodes and sweeps the client concurrency.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Experiment configuration (YAML, or JSON with a `.json` extension).
    #[arg(long, short = 'c')]
    config: PathBuf,

    /// Keep the reservation after the sweep or on failure.
    #[arg(long)]
    keep_alive: bool,

    /// Reuse running jobs instead of reserving, as `<id>:<site>[,<id>:<site>...]`.
    #[arg(long)]
    job_ids: Option<String>,

    /// Skip re-imaging the nodes.
    #[arg(long)]
    no_deploy_os: bool,

    /// Control plane of an already configured Kubernetes cluster.
    #[arg(long)]
    kube_master: Option<String>,

    #[arg(long, default_value = logger::LOG_DIR)]
    log_dir: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(&cli.log_dir);

    let config = load_experiment(&cli.config, !cli.no_deploy_os).with_context(|| format!("Cannot load {}", cli.config.display()))?;
    let existing_jobs = cli.job_ids.as_deref().map(|ids| Reservation::parse_job_ids(ids, cli.keep_alive)).transpose()?;

    let scheduler = G5kScheduler::new(
        config.scheduler.api_url.clone(),
        config.scheduler.credentials.clone(),
        config.scheduler.read_ssh_public_key()?,
    )?;
    let ssh = Arc::new(SshClient::new(config.ssh.clone()));

    let options = DriverOptions { keep_alive: cli.keep_alive, existing_jobs, kube_master: cli.kube_master.map(HostName::new) };
    let mut driver = ExperimentDriver::new(config, options, Arc::new(scheduler), ssh.clone(), ssh);

    let outcome = tokio::select! {
        result = driver.run() => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => Err(anyhow!("Interrupted by the operator")),
    };

    match outcome {
        Ok(stats) => {
            log::info!("Experiment finished: {} done, {} cancelled", stats.done, stats.cancelled);
            Ok(())
        }
        Err(e) => {
            log::error!("Experiment aborted in state {}: {:#}", driver.state(), e);
            driver.teardown().await;
            Err(e)
        }
    }
}
