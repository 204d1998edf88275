use crate::domain::utils::id::HostName;
use crate::error::{Error, Result};

/// What one host returned for a remote command.
#[derive(Debug, Clone)]
pub struct HostOutput {
    pub host: HostName,
    /// `None` when the process was killed by a signal or never started.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HostOutput {
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone)]
pub struct HostFailure {
    pub host: HostName,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl HostFailure {
    pub fn summary(failures: &[HostFailure]) -> String {
        failures
            .iter()
            .map(|f| match f.exit_code {
                Some(code) => format!("{} (exit {}): {}", f.host, code, f.stderr.trim()),
                None => format!("{} (no exit code): {}", f.host, f.stderr.trim()),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Per-host outputs of one command, in the order the hosts were given.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: String,
    pub outputs: Vec<HostOutput>,
}

impl CommandOutcome {
    pub fn new(command: impl Into<String>, outputs: Vec<HostOutput>) -> Self {
        Self { command: command.into(), outputs }
    }

    pub fn failures(&self) -> Vec<HostFailure> {
        self.outputs
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| HostFailure { host: o.host.clone(), exit_code: o.exit_code, stderr: o.stderr.clone() })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outputs.iter().all(HostOutput::is_success)
    }

    /// Turns any non-zero exit into [`Error::RemoteCommandFailure`] carrying every failed host.
    pub fn into_result(self) -> Result<Self> {
        let failures = self.failures();
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::RemoteCommandFailure { command: self.command, failures })
        }
    }

    /// Stdout of the first host, trimmed. Commands aimed at the control plane target a single host.
    pub fn stdout(&self) -> &str {
        self.outputs.first().map(|o| o.stdout.trim()).unwrap_or("")
    }

    /// Non-empty trimmed lines of [`CommandOutcome::stdout`].
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout().lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect()
    }
}
