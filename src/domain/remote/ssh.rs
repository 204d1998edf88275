use async_trait::async_trait;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

use crate::domain::remote::command_result::{CommandOutcome, HostFailure, HostOutput};
use crate::domain::remote::executor::CommandExecutor;
use crate::domain::remote::transfer::FileTransfer;
use crate::domain::utils::id::HostName;
use crate::error::{Error, Result};

/// Connection settings shared by every ssh/scp invocation.
#[derive(Debug, Clone)]
pub struct SshSettings {
    pub user: String,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout_s: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self { user: "root".to_string(), identity_file: None, connect_timeout_s: 20 }
    }
}

/// [`CommandExecutor`] and [`FileTransfer`] backed by the system `ssh` and `scp` binaries.
///
/// Hosts of one call are contacted concurrently; the call returns once all of them answered.
#[derive(Debug, Clone)]
pub struct SshClient {
    settings: SshSettings,
}

impl SshClient {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    fn common_options(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.settings.connect_timeout_s),
        ];
        if let Some(key) = &self.settings.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }

    fn target(&self, host: &HostName) -> String {
        format!("{}@{}", self.settings.user, host)
    }

    async fn ssh(&self, command: &str, host: &HostName) -> HostOutput {
        let output = Command::new("ssh").args(self.common_options()).arg(self.target(host)).arg(command).output().await;
        to_host_output(host, output)
    }

    async fn scp(&self, host: &HostName, sources: Vec<String>, destination: String) -> HostOutput {
        let output = Command::new("scp").args(self.common_options()).arg("-r").args(sources).arg(destination).output().await;
        to_host_output(host, output)
    }
}

fn to_host_output(host: &HostName, output: std::io::Result<Output>) -> HostOutput {
    match output {
        Ok(output) => HostOutput {
            host: host.clone(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(e) => HostOutput { host: host.clone(), exit_code: None, stdout: String::new(), stderr: e.to_string() },
    }
}

fn transfer_result(command: String, outputs: Vec<HostOutput>) -> Result<()> {
    let failures: Vec<HostFailure> = CommandOutcome::new(command.clone(), outputs).failures();
    if failures.is_empty() { Ok(()) } else { Err(Error::RemoteCommandFailure { command, failures }) }
}

#[async_trait]
impl CommandExecutor for SshClient {
    async fn execute(&self, command: &str, hosts: &[HostName]) -> Result<CommandOutcome> {
        log::debug!("Running '{}' on {} host(s)", command, hosts.len());
        let outputs = join_all(hosts.iter().map(|host| self.ssh(command, host))).await;
        Ok(CommandOutcome::new(command, outputs))
    }
}

#[async_trait]
impl FileTransfer for SshClient {
    async fn put(&self, hosts: &[HostName], local_paths: &[PathBuf], remote_dir: &str) -> Result<()> {
        let sources: Vec<String> = local_paths.iter().map(|p| p.display().to_string()).collect();
        log::debug!("Uploading {:?} to '{}' on {} host(s)", sources, remote_dir, hosts.len());

        let outputs =
            join_all(hosts.iter().map(|host| self.scp(host, sources.clone(), format!("{}:{}", self.target(host), remote_dir)))).await;
        transfer_result(format!("scp {:?} -> {}", sources, remote_dir), outputs)
    }

    async fn get(&self, hosts: &[HostName], remote_paths: &[String], local_dir: &Path) -> Result<()> {
        log::debug!("Downloading {:?} from {} host(s) into '{}'", remote_paths, hosts.len(), local_dir.display());

        let mut transfers = Vec::with_capacity(hosts.len());
        for host in hosts {
            let host_dir = local_dir.join(host.as_str());
            tokio::fs::create_dir_all(&host_dir).await?;
            let sources: Vec<String> = remote_paths.iter().map(|p| format!("{}:{}", self.target(host), p)).collect();
            transfers.push(self.scp(host, sources, host_dir.display().to_string()));
        }

        let outputs = join_all(transfers).await;
        transfer_result(format!("scp {:?} -> {}", remote_paths, local_dir.display()), outputs)
    }
}
