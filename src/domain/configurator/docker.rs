use std::sync::Arc;

use crate::domain::configurator::packages::PackagesConfigurator;
use crate::domain::remote::executor::CommandExecutor;
use crate::domain::utils::id::HostName;
use crate::error::Result;

pub const GET_DOCKER_URL: &str = "https://get.docker.com";

/// Installs the Docker engine with the official convenience script.
#[derive(Debug, Clone)]
pub struct DockerConfigurator {
    executor: Arc<dyn CommandExecutor>,
    packages: PackagesConfigurator,
}

impl DockerConfigurator {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        let packages = PackagesConfigurator::new(executor.clone());
        Self { executor, packages }
    }

    pub async fn config_docker(&self, hosts: &[HostName]) -> Result<()> {
        log::info!("Installing Docker on {} host(s)", hosts.len());
        self.packages.install(&["wget"], hosts).await?;

        log::info!("Downloading the get-docker script");
        self.executor.run(&format!("wget -q {} -O get-docker.sh", GET_DOCKER_URL), hosts).await?;

        log::info!("Running the get-docker script");
        self.executor.run("sh get-docker.sh", hosts).await?;

        log::info!("Docker installed on {} host(s)", hosts.len());
        Ok(())
    }
}
