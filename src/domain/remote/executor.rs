use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::remote::command_result::CommandOutcome;
use crate::domain::utils::id::HostName;
use crate::error::Result;

/// Runs a shell command on a set of remote hosts.
///
/// Fan-out across hosts is the implementation's business: a call returns once every
/// targeted host has answered or errored.
#[async_trait]
pub trait CommandExecutor: Debug + Send + Sync {
    /// Runs `command` on `hosts` and returns every host's output, successful or not.
    async fn execute(&self, command: &str, hosts: &[HostName]) -> Result<CommandOutcome>;

    /// Like [`CommandExecutor::execute`], but a non-zero exit on any host is an error.
    async fn run(&self, command: &str, hosts: &[HostName]) -> Result<CommandOutcome> {
        self.execute(command, hosts).await?.into_result()
    }

    /// Runs `command` on a single host and returns its trimmed stdout.
    async fn run_on(&self, command: &str, host: &HostName) -> Result<String> {
        let outcome = self.run(command, std::slice::from_ref(host)).await?;
        Ok(outcome.stdout().to_string())
    }
}
