use std::path::Path;
use std::sync::Arc;

use crate::api::config_dto::cibench_dto::CiBenchConfigDto;
use crate::api::config_dto::experiment_dto::ClusterDto;
use crate::domain::configurator::docker::DockerConfigurator;
use crate::domain::configurator::packages::PackagesConfigurator;
use crate::domain::experiment::config::{
    SchedulerSettings, check_walltime, cluster_specs, provisioner_settings, scheduler_settings, ssh_settings,
};
use crate::domain::provisioner::provisioner::{Provisioner, ProvisionerSettings};
use crate::domain::provisioner::reservation::{HostSet, NodeRequest, Reservation};
use crate::domain::provisioner::scheduler_trait::TestbedScheduler;
use crate::domain::remote::executor::CommandExecutor;
use crate::domain::remote::ssh::SshSettings;
use crate::domain::utils::id::HostName;
use crate::error::{Error, Result};
use crate::loader::parser::parse_config_file;

pub const ANTIDOTE_REPO: &str = "https://github.com/AntidoteDB/antidote.git";
pub const CIBENCH_REPO: &str = "https://github.com/AntidoteDB/CI-bench.git";
pub const BENCHMARK_IMAGE: &str = "antidote-benchmark";
/// Images every node pulls once Docker runs.
pub const PULLED_IMAGES: [&str; 2] = ["antidotedb/antidote", "google/cadvisor"];
const DEFAULT_JOB_NAME: &str = "cibench";

/// Validated configuration of the CI-Bench environment.
#[derive(Debug, Clone)]
pub struct CiBenchConfig {
    pub provisioner: ProvisionerSettings,
    pub scheduler: SchedulerSettings,
    pub ssh: SshSettings,
    pub nodes: Vec<NodeRequest>,
    pub antidote_repo: String,
    pub cibench_repo: String,
    pub benchmark_image: String,
}

impl CiBenchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let dto: CiBenchConfigDto = parse_config_file(path)?;
        log::info!("Configuration {} parsed", path.display());
        Self::try_from(dto)
    }
}

impl TryFrom<CiBenchConfigDto> for CiBenchConfig {
    type Error = Error;

    fn try_from(dto: CiBenchConfigDto) -> Result<Self> {
        check_walltime(&dto.walltime)?;

        let entries: Vec<ClusterDto> = dto.clusters.iter().map(|c| ClusterDto { cluster: c.cluster.clone(), site: c.site.clone() }).collect();
        let specs = cluster_specs(&entries)?;
        if let Some(empty) = dto.clusters.iter().find(|c| c.n_nodes == 0) {
            return Err(Error::ConfigValidation(format!("Cluster {} requests no node", empty.cluster)));
        }
        let nodes = specs
            .into_iter()
            .zip(&dto.clusters)
            .map(|(spec, entry)| NodeRequest { cluster: spec.cluster, site: spec.site, nodes: entry.n_nodes })
            .collect();

        let provisioner = provisioner_settings(
            dto.job_name.unwrap_or_else(|| DEFAULT_JOB_NAME.to_string()),
            dto.walltime,
            dto.start_date,
            dto.image,
            &dto.scheduler,
        );

        Ok(Self {
            provisioner,
            scheduler: scheduler_settings(dto.scheduler)?,
            ssh: ssh_settings(dto.ssh),
            nodes,
            antidote_repo: dto.antidote_repo.unwrap_or_else(|| ANTIDOTE_REPO.to_string()),
            cibench_repo: dto.cibench_repo.unwrap_or_else(|| CIBENCH_REPO.to_string()),
            benchmark_image: dto.benchmark_image.unwrap_or_else(|| BENCHMARK_IMAGE.to_string()),
        })
    }
}

/// Checkout directory `git clone` picks for `url`.
fn checkout_dir(url: &str) -> &str {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    last.strip_suffix(".git").unwrap_or(last)
}

#[derive(Debug, Clone, Default)]
pub struct CiBenchOptions {
    pub keep_alive: bool,
    /// Reservation to adopt instead of submitting new jobs.
    pub existing_jobs: Option<Reservation>,
}

/// Prepares Grid'5000 nodes for CI-Bench runs: Docker, the AntidoteDB images and a
/// built benchmark image.
#[derive(Debug)]
pub struct CiBenchEnvironment {
    config: Arc<CiBenchConfig>,
    options: CiBenchOptions,
    provisioner: Provisioner,
    executor: Arc<dyn CommandExecutor>,
    reservation: Option<Reservation>,
}

impl CiBenchEnvironment {
    pub fn new(config: Arc<CiBenchConfig>, options: CiBenchOptions, scheduler: Arc<dyn TestbedScheduler>, executor: Arc<dyn CommandExecutor>) -> Self {
        let provisioner = Provisioner::new(scheduler, config.provisioner.clone());
        Self { config, options, provisioner, executor, reservation: None }
    }

    /// Provisions the nodes and configures them. Call [`CiBenchEnvironment::teardown`] afterwards.
    pub async fn run(&mut self) -> Result<HostSet> {
        log::info!("Starting to provision nodes");
        let existing = self.options.existing_jobs.take();
        let reservation = self.provisioner.acquire(&self.config.nodes, existing, self.options.keep_alive).await?;
        self.reservation = Some(reservation.clone());
        let hosts = self.provisioner.prepare_hosts(&reservation).await?;
        log::info!("{} host(s) provisioned: {:?}", hosts.len(), hosts.hosts());

        log::info!("Starting to configure CI-Bench on nodes");
        self.configure(hosts.hosts()).await?;
        log::info!("CI-Bench configured on {} host(s)", hosts.len());
        Ok(hosts)
    }

    async fn configure(&self, hosts: &[HostName]) -> Result<()> {
        DockerConfigurator::new(self.executor.clone()).config_docker(hosts).await?;

        for image in PULLED_IMAGES {
            log::info!("Pulling image {}", image);
            self.executor.run(&format!("docker pull {}", image), hosts).await?;
        }

        PackagesConfigurator::new(self.executor.clone()).install(&["docker-compose"], hosts).await?;

        let antidote = checkout_dir(&self.config.antidote_repo);
        self.clone_repo(&self.config.antidote_repo, hosts).await?;
        log::info!("Building the AntidoteDB image");
        self.executor.run(&format!("cd ~/{} && make docker-build", antidote), hosts).await?;

        let cibench = checkout_dir(&self.config.cibench_repo);
        self.clone_repo(&self.config.cibench_repo, hosts).await?;
        log::info!("Building image {}", self.config.benchmark_image);
        self.executor.run(&format!("cd ~/{} && docker build --no-cache -t {} .", cibench, self.config.benchmark_image), hosts).await?;
        Ok(())
    }

    /// Clones into the home directory; an existing checkout is kept so reused jobs can run again.
    async fn clone_repo(&self, url: &str, hosts: &[HostName]) -> Result<()> {
        let dir = checkout_dir(url);
        log::info!("Cloning {} into ~/{}", url, dir);
        self.executor.run(&format!("cd ~/ && (test -d {dir} || git clone {url} {dir})", dir = dir, url = url), hosts).await?;
        Ok(())
    }

    /// Releases the reservation unless it must be kept alive.
    pub async fn teardown(&mut self) {
        let Some(reservation) = self.reservation.take() else {
            return;
        };
        if self.options.keep_alive {
            log::info!("Reserved nodes of {} are kept alive for inspection", reservation);
        } else {
            log::info!("Deleting reservation {}", reservation);
            self.provisioner.release(&reservation).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_dir_follows_git_naming() {
        assert_eq!(checkout_dir(ANTIDOTE_REPO), "antidote");
        assert_eq!(checkout_dir(CIBENCH_REPO), "CI-bench");
        assert_eq!(checkout_dir("https://example.org/team/bench/"), "bench");
    }
}
