use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::utils::id::{DeploymentId, HostName, JobId, SiteName};
use crate::error::Result;

/// Lifecycle of a scheduler job as reported by the testbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Launching,
    Running,
    Hold,
    Error,
    Terminated,
    Unknown(String),
}

impl JobState {
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "waiting" | "towait" => JobState::Waiting,
            "launching" | "tolaunch" => JobState::Launching,
            "running" => JobState::Running,
            "hold" => JobState::Hold,
            "error" | "toerror" => JobState::Error,
            "terminated" | "finishing" => JobState::Terminated,
            _ => JobState::Unknown(state.to_string()),
        }
    }

    /// The nodes of the job are gone or never came up.
    pub fn is_dead(&self) -> bool {
        matches!(self, JobState::Error | JobState::Terminated)
    }
}

#[derive(Debug, Clone)]
pub struct JobInfo {
    pub state: JobState,
    pub assigned_nodes: Vec<HostName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentStatus {
    Processing,
    /// Deployment finished; lists the nodes that came up with the new image.
    Terminated { deployed: Vec<HostName> },
    Error(String),
}

/// Job submission as understood by the testbed scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Resource expression, e.g. `{cluster='paravance'}/nodes=4`.
    pub resources: String,
    /// `HH:MM:SS`.
    pub walltime: String,
    pub name: String,
    pub deploy: bool,
    /// Advance reservation start date (`YYYY-MM-DD HH:MM:SS`), immediate submission when absent.
    pub start_date: Option<String>,
}

/// Job-scheduler surface of a bare-metal testbed.
#[async_trait]
pub trait TestbedScheduler: Debug + Send + Sync {
    async fn submit_job(&self, site: &SiteName, request: &JobRequest) -> Result<JobId>;

    async fn job_info(&self, site: &SiteName, job_id: &JobId) -> Result<JobInfo>;

    async fn delete_job(&self, site: &SiteName, job_id: &JobId) -> Result<()>;

    async fn submit_deployment(&self, site: &SiteName, hosts: &[HostName], image: &str) -> Result<DeploymentId>;

    async fn deployment_status(&self, site: &SiteName, deployment: &DeploymentId) -> Result<DeploymentStatus>;
}
