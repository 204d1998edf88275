use anyhow::{Context, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use testbed_bench_workflow::domain::experiment::cibench::{CiBenchEnvironment, CiBenchOptions};
use testbed_bench_workflow::domain::provisioner::g5k::g5k_scheduler::G5kScheduler;
use testbed_bench_workflow::domain::provisioner::reservation::Reservation;
use testbed_bench_workflow::domain::remote::ssh::SshClient;
use testbed_bench_workflow::{load_cibench, logger};

/// Reserves Grid'5000 nodes and prepares them to run CI-Bench against AntidoteDB.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Environment configuration (YAML, or JSON with a `.json` extension).
    #[arg(long, short = 'c')]
    config: PathBuf,

    /// Keep the reservation once the nodes are configured or on failure.
    #[arg(long)]
    keep_alive: bool,

    /// Reuse running jobs instead of reserving, as `<id>:<site>[,<id>:<site>...]`.
    #[arg(long)]
    job_ids: Option<String>,

    /// Skip re-imaging the nodes.
    #[arg(long)]
    no_deploy_os: bool,

    #[arg(long, default_value = logger::LOG_DIR)]
    log_dir: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(&cli.log_dir);

    let config = load_cibench(&cli.config, !cli.no_deploy_os).with_context(|| format!("Cannot load {}", cli.config.display()))?;
    let existing_jobs = cli.job_ids.as_deref().map(|ids| Reservation::parse_job_ids(ids, cli.keep_alive)).transpose()?;

    let scheduler = G5kScheduler::new(
        config.scheduler.api_url.clone(),
        config.scheduler.credentials.clone(),
        config.scheduler.read_ssh_public_key()?,
    )?;
    let ssh = Arc::new(SshClient::new(config.ssh.clone()));

    let options = CiBenchOptions { keep_alive: cli.keep_alive, existing_jobs };
    let mut environment = CiBenchEnvironment::new(config, options, Arc::new(scheduler), ssh);

    let outcome = tokio::select! {
        result = environment.run() => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => Err(anyhow!("Interrupted by the operator")),
    };

    // Released on every exit path unless kept alive.
    environment.teardown().await;
    match outcome {
        Ok(hosts) => {
            log::info!("CI-Bench environment ready on {:?}", hosts.hosts());
            Ok(())
        }
        Err(e) => {
            log::error!("CI-Bench environment setup aborted: {:#}", e);
            Err(e)
        }
    }
}
