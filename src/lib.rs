use std::path::Path;
use std::sync::Arc;

use crate::domain::experiment::cibench::CiBenchConfig;
use crate::domain::experiment::config::ExperimentConfig;
use crate::error::Result;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads and validates the experiment configuration at `file_path`.
///
/// With `deploy_os` unset the nodes keep the OS they were reserved with.
pub fn load_experiment(file_path: &Path, deploy_os: bool) -> Result<Arc<ExperimentConfig>> {
    let mut config = ExperimentConfig::load(file_path)?;
    if !deploy_os {
        config.provisioner.image = None;
    }
    log::info!(
        "Experiment over {} cluster(s), control plane in {}, {} combination(s)",
        config.clusters.len(),
        config.master_cluster,
        config.parameters.len()
    );
    Ok(Arc::new(config))
}

/// Loads and validates the CI-Bench environment configuration at `file_path`.
pub fn load_cibench(file_path: &Path, deploy_os: bool) -> Result<Arc<CiBenchConfig>> {
    let mut config = CiBenchConfig::load(file_path)?;
    if !deploy_os {
        config.provisioner.image = None;
    }
    let nodes: usize = config.nodes.iter().map(|request| request.nodes).sum();
    log::info!("CI-Bench environment over {} cluster(s), {} node(s)", config.nodes.len(), nodes);
    Ok(Arc::new(config))
}
