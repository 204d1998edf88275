use serde::{Deserialize, Serialize};

use crate::api::config_dto::experiment_dto::{SchedulerDto, SshDto};

/// Root of the CI-Bench environment configuration file.
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct CiBenchConfigDto {
    /// `HH:MM:SS`.
    pub walltime: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub scheduler: SchedulerDto,
    #[serde(default)]
    pub ssh: SshDto,
    pub clusters: Vec<CiBenchClusterDto>,
    #[serde(default)]
    pub antidote_repo: Option<String>,
    #[serde(default)]
    pub cibench_repo: Option<String>,
    /// Tag of the benchmark image built from the CI-Bench checkout.
    #[serde(default)]
    pub benchmark_image: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct CiBenchClusterDto {
    pub cluster: String,
    pub site: String,
    #[serde(default = "default_nodes")]
    pub n_nodes: usize,
}

fn default_nodes() -> usize {
    1
}
