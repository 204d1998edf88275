use std::sync::Arc;

use crate::domain::remote::executor::CommandExecutor;
use crate::domain::utils::id::HostName;
use crate::error::Result;

/// Installs Debian packages on a host set.
#[derive(Debug, Clone)]
pub struct PackagesConfigurator {
    executor: Arc<dyn CommandExecutor>,
}

impl PackagesConfigurator {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    pub async fn install(&self, packages: &[&str], hosts: &[HostName]) -> Result<()> {
        if packages.is_empty() || hosts.is_empty() {
            return Ok(());
        }
        log::info!("Installing {} on {} host(s)", packages.join(" "), hosts.len());
        let command = format!(
            "export DEBIAN_FRONTEND=noninteractive; apt-get update -q && apt-get install -y -q --allow-change-held-packages {}",
            packages.join(" ")
        );
        self.executor.run(&command, hosts).await?;
        Ok(())
    }
}
