use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::config_dto::experiment_dto::{ClusterDto, ExperimentConfigDto, SchedulerDto, SshDto};
use crate::domain::configurator::kubernetes::KubernetesSettings;
use crate::domain::configurator::roles::RoleCounts;
use crate::domain::provisioner::g5k::g5k_scheduler::{DEFAULT_API_URL, G5kCredentials};
use crate::domain::provisioner::provisioner::ProvisionerSettings;
use crate::domain::provisioner::reservation::NodeRequest;
use crate::domain::remote::ssh::SshSettings;
use crate::domain::sweeper::combination::ParamValue;
use crate::domain::sweeper::parameter_space::ParameterSpace;
use crate::domain::utils::id::{ClusterName, SiteName};
use crate::error::{Error, Result};
use crate::loader::parser::parse_config_file;

pub const ITERATION_PARAM: &str = "iteration";
pub const CONCURRENCY_PARAM: &str = "concurrent_clients";
pub const DEFAULT_NAMESPACE: &str = "fmke-exp";
const DEFAULT_JOB_NAME: &str = "antidotedb_fmke";
/// Leaves room for the longest object name built from a cluster, `antidote-exposer-<cluster>`.
const MAX_CLUSTER_NAME_LEN: usize = 46;

lazy_static! {
    static ref WALLTIME: Regex = Regex::new(r"^\d+:[0-5]\d:[0-5]\d$").expect("walltime pattern is valid");
    static ref DNS_LABEL: Regex = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("DNS label pattern is valid");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub cluster: ClusterName,
    pub site: SiteName,
}

/// Bounded waits of one sweep iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentTimeouts {
    /// Pods ready, DC creation and linking.
    pub readiness: Duration,
    /// Each of the two data population phases.
    pub populate: Duration,
    /// Added to the load duration before giving up on the clients.
    pub client_grace: Duration,
}

impl Default for ExperimentTimeouts {
    fn default() -> Self {
        Self { readiness: Duration::from_secs(300), populate: Duration::from_secs(800), client_grace: Duration::from_secs(300) }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub api_url: String,
    pub credentials: Option<G5kCredentials>,
    pub ssh_public_key: Option<PathBuf>,
}

impl SchedulerSettings {
    /// Content of the public key file, if one is configured.
    pub fn read_ssh_public_key(&self) -> Result<Option<String>> {
        match &self.ssh_public_key {
            Some(path) => Ok(Some(std::fs::read_to_string(path)?.trim().to_string())),
            None => Ok(None),
        }
    }
}

/// Validated experiment configuration.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub provisioner: ProvisionerSettings,
    pub scheduler: SchedulerSettings,
    pub ssh: SshSettings,
    pub kubernetes: KubernetesSettings,
    pub clusters: Vec<ClusterSpec>,
    pub master_cluster: ClusterName,
    pub role_counts: RoleCounts,
    pub antidote_dir: PathBuf,
    pub fmke_dir: PathBuf,
    pub volume_dir: PathBuf,
    pub results_dir: PathBuf,
    pub namespace: String,
    pub timeouts: ExperimentTimeouts,
    pub parameters: ParameterSpace,
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let dto: ExperimentConfigDto = parse_config_file(path)?;
        log::info!("Configuration {} parsed", path.display());
        Self::try_from(dto)
    }

    pub fn cluster_names(&self) -> Vec<ClusterName> {
        self.clusters.iter().map(|c| c.cluster.clone()).collect()
    }

    /// Nodes to reserve per cluster: one worker per role slot, plus the control plane
    /// in the master cluster.
    pub fn node_requests(&self) -> Vec<NodeRequest> {
        self.clusters
            .iter()
            .map(|spec| {
                let extra = usize::from(spec.cluster == self.master_cluster);
                NodeRequest { cluster: spec.cluster.clone(), site: spec.site.clone(), nodes: self.role_counts.total() + extra }
            })
            .collect()
    }

    pub fn sweep_dir(&self) -> PathBuf {
        self.results_dir.join("sweeps")
    }

    pub fn credentials_dir(&self) -> PathBuf {
        self.results_dir.join("credentials")
    }
}

/// Resolves a leading `~` against `$HOME`.
fn expand_home(path: PathBuf) -> PathBuf {
    if let (Ok(rest), Some(home)) = (path.strip_prefix("~"), std::env::var_os("HOME")) {
        return PathBuf::from(home).join(rest);
    }
    path
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation(message.into())
}

pub(crate) fn check_walltime(walltime: &str) -> Result<()> {
    if !WALLTIME.is_match(walltime) {
        return Err(invalid(format!("Walltime '{}' is not of the form HH:MM:SS", walltime)));
    }
    Ok(())
}

/// Non-empty list of distinct clusters whose names are usable in Kubernetes object names.
pub(crate) fn cluster_specs(entries: &[ClusterDto]) -> Result<Vec<ClusterSpec>> {
    if entries.is_empty() {
        return Err(invalid("No cluster configured"));
    }
    let mut seen = BTreeSet::new();
    for entry in entries {
        if entry.cluster.is_empty() || entry.site.is_empty() {
            return Err(invalid("Cluster entries need a cluster and a site"));
        }
        if !DNS_LABEL.is_match(&entry.cluster) || entry.cluster.len() > MAX_CLUSTER_NAME_LEN {
            return Err(invalid(format!(
                "Cluster name '{}' is not a lowercase DNS label of at most {} characters",
                entry.cluster, MAX_CLUSTER_NAME_LEN
            )));
        }
        if !seen.insert(entry.cluster.as_str()) {
            return Err(invalid(format!("Cluster {} is listed twice", entry.cluster)));
        }
    }
    Ok(entries.iter().map(|c| ClusterSpec { cluster: ClusterName::new(&c.cluster), site: SiteName::new(&c.site) }).collect())
}

pub(crate) fn scheduler_settings(dto: SchedulerDto) -> Result<SchedulerSettings> {
    let credentials = match (dto.username, dto.password) {
        (Some(username), Some(password)) => Some(G5kCredentials { username, password }),
        (None, None) => None,
        _ => return Err(invalid("Scheduler credentials need both a username and a password")),
    };
    Ok(SchedulerSettings {
        api_url: dto.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        credentials,
        ssh_public_key: dto.ssh_public_key.map(expand_home),
    })
}

pub(crate) fn provisioner_settings(
    job_name: String,
    walltime: String,
    start_date: Option<String>,
    image: Option<String>,
    scheduler: &SchedulerDto,
) -> ProvisionerSettings {
    let mut provisioner = ProvisionerSettings { job_name, walltime, start_date, image, ..ProvisionerSettings::default() };
    if let Some(seconds) = scheduler.resolve_timeout_s {
        provisioner.resolve_timeout = Duration::from_secs(seconds);
    }
    if let Some(seconds) = scheduler.deploy_timeout_s {
        provisioner.deploy_timeout = Duration::from_secs(seconds);
    }
    provisioner
}

pub(crate) fn ssh_settings(dto: SshDto) -> SshSettings {
    let defaults = SshSettings::default();
    SshSettings {
        user: dto.user.unwrap_or(defaults.user),
        identity_file: dto.identity_file.map(expand_home),
        connect_timeout_s: dto.connect_timeout_s.unwrap_or(defaults.connect_timeout_s),
    }
}

impl TryFrom<ExperimentConfigDto> for ExperimentConfig {
    type Error = Error;

    fn try_from(dto: ExperimentConfigDto) -> Result<Self> {
        check_walltime(&dto.walltime)?;

        let env = dto.exp_env;
        let clusters = cluster_specs(&env.clusters)?;

        let master_cluster = match env.kube_master_cluster {
            Some(master) if clusters.iter().any(|c| c.cluster.as_str() == master) => ClusterName::new(master),
            Some(master) => return Err(invalid(format!("Control plane cluster {} is not one of the configured clusters", master))),
            None => clusters[0].cluster.clone(),
        };

        let role_counts = RoleCounts { database: env.n_antidotedb_per_dc, application: env.n_fmke_app_per_dc, client: env.n_fmke_client_per_dc };
        if role_counts.database == 0 || role_counts.application == 0 || role_counts.client == 0 {
            return Err(invalid("Every data center needs at least one database, one application and one client node"));
        }

        let namespace = env.kube_namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        if !DNS_LABEL.is_match(&namespace) {
            return Err(invalid(format!("Namespace '{}' is not a valid DNS label", namespace)));
        }

        let parameters = dto.parameters;
        if parameters.iteration < 1 {
            return Err(invalid("At least one iteration is required"));
        }
        if parameters.concurrent_clients.is_empty() {
            return Err(invalid("No client concurrency configured"));
        }
        if let Some(bad) = parameters.concurrent_clients.iter().find(|c| **c < 1) {
            return Err(invalid(format!("Client concurrency {} is not positive", bad)));
        }
        let parameter_space = ParameterSpace::new()
            .with(ITERATION_PARAM, (1..=parameters.iteration).map(ParamValue::Int))
            .with(CONCURRENCY_PARAM, parameters.concurrent_clients.into_iter().map(ParamValue::Int));

        let provisioner = provisioner_settings(
            dto.job_name.unwrap_or_else(|| DEFAULT_JOB_NAME.to_string()),
            dto.walltime,
            dto.start_date,
            dto.image,
            &dto.scheduler,
        );
        let scheduler = scheduler_settings(dto.scheduler)?;
        let ssh = ssh_settings(dto.ssh);

        let k8s_defaults = KubernetesSettings::default();
        let kubernetes = KubernetesSettings {
            version: dto.kubernetes.version.unwrap_or(k8s_defaults.version),
            pod_network_cidr: dto.kubernetes.pod_network_cidr.unwrap_or(k8s_defaults.pod_network_cidr),
            network_manifest_url: dto.kubernetes.network_manifest_url.unwrap_or(k8s_defaults.network_manifest_url),
            volumes_per_worker: dto.kubernetes.volumes_per_worker.unwrap_or(k8s_defaults.volumes_per_worker),
            volume_device: dto.kubernetes.volume_device.unwrap_or(k8s_defaults.volume_device),
            ..k8s_defaults
        };
        if kubernetes.volumes_per_worker == 0 {
            return Err(invalid("At least one local volume per worker is required"));
        }

        let defaults = ExperimentTimeouts::default();
        let timeouts = ExperimentTimeouts {
            readiness: env.timeouts.readiness_s.map(Duration::from_secs).unwrap_or(defaults.readiness),
            populate: env.timeouts.populate_s.map(Duration::from_secs).unwrap_or(defaults.populate),
            client_grace: env.timeouts.client_grace_s.map(Duration::from_secs).unwrap_or(defaults.client_grace),
        };

        Ok(Self {
            provisioner,
            scheduler,
            ssh,
            kubernetes,
            clusters,
            master_cluster,
            role_counts,
            antidote_dir: env.antidote_yaml_path,
            fmke_dir: env.fmke_yaml_path,
            volume_dir: env.volume_yaml_path,
            results_dir: env.results_dir,
            namespace,
            timeouts,
            parameters: parameter_space,
        })
    }
}
