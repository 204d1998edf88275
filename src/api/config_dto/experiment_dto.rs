use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root of the experiment configuration file.
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct ExperimentConfigDto {
    /// `HH:MM:SS`.
    pub walltime: String,
    #[serde(default)]
    pub start_date: Option<String>,
    /// Base OS image deployed on the reserved nodes.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub scheduler: SchedulerDto,
    #[serde(default)]
    pub ssh: SshDto,
    #[serde(default)]
    pub kubernetes: KubernetesDto,
    pub exp_env: ExpEnvDto,
    pub parameters: ParametersDto,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct SchedulerDto {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Public key file installed on deployed nodes.
    #[serde(default)]
    pub ssh_public_key: Option<PathBuf>,
    #[serde(default)]
    pub resolve_timeout_s: Option<u64>,
    #[serde(default)]
    pub deploy_timeout_s: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct SshDto {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    #[serde(default)]
    pub connect_timeout_s: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct KubernetesDto {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub pod_network_cidr: Option<String>,
    #[serde(default)]
    pub network_manifest_url: Option<String>,
    #[serde(default)]
    pub volumes_per_worker: Option<usize>,
    #[serde(default)]
    pub volume_device: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct ClusterDto {
    pub cluster: String,
    pub site: String,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct ExpEnvDto {
    pub clusters: Vec<ClusterDto>,
    /// Cluster hosting the control plane. Defaults to the first cluster.
    #[serde(default)]
    pub kube_master_cluster: Option<String>,
    pub n_antidotedb_per_dc: usize,
    pub n_fmke_app_per_dc: usize,
    pub n_fmke_client_per_dc: usize,
    pub antidote_yaml_path: PathBuf,
    pub fmke_yaml_path: PathBuf,
    pub volume_yaml_path: PathBuf,
    pub results_dir: PathBuf,
    #[serde(default)]
    pub kube_namespace: Option<String>,
    #[serde(default)]
    pub timeouts: TimeoutsDto,
}

/// Bounded waits of the sweep iterations, in seconds.
#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct TimeoutsDto {
    #[serde(default)]
    pub readiness_s: Option<u64>,
    #[serde(default)]
    pub populate_s: Option<u64>,
    /// Added to the load duration of the client config.
    #[serde(default)]
    pub client_grace_s: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct ParametersDto {
    /// Number of repetitions; iterations run from 1 to this value.
    pub iteration: i64,
    pub concurrent_clients: Vec<i64>,
}
