#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use testbed_bench_workflow::domain::provisioner::scheduler_trait::{DeploymentStatus, JobInfo, JobRequest, JobState, TestbedScheduler};
use testbed_bench_workflow::domain::remote::command_result::{CommandOutcome, HostOutput};
use testbed_bench_workflow::domain::remote::executor::CommandExecutor;
use testbed_bench_workflow::domain::remote::transfer::FileTransfer;
use testbed_bench_workflow::domain::utils::id::{DeploymentId, HostName, JobId, SiteName};
use testbed_bench_workflow::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Reply {
    pub exit_code: i32,
    pub stdout: String,
}

impl Reply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Reply { exit_code: 0, stdout: stdout.into() }
    }

    pub fn fail() -> Self {
        Reply { exit_code: 1, stdout: String::new() }
    }
}

/// Answers commands by substring match. The most recently added matching rule wins;
/// a rule with several replies hands them out in order and repeats the last one.
/// Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct MockExecutor {
    rules: Mutex<Vec<(String, VecDeque<Reply>)>>,
    pub commands: Mutex<Vec<(String, Vec<HostName>)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, pattern: &str, reply: Reply) -> &Self {
        self.on_seq(pattern, vec![reply])
    }

    pub fn on_seq(&self, pattern: &str, replies: Vec<Reply>) -> &Self {
        self.rules.lock().unwrap().push((pattern.to_string(), replies.into()));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().iter().map(|(command, _)| command.clone()).collect()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.commands().iter().filter(|command| command.contains(pattern)).count()
    }

    fn reply_for(&self, command: &str) -> Reply {
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().rev().find(|(pattern, _)| command.contains(pattern.as_str())) {
            Some((_, replies)) if replies.len() > 1 => replies.pop_front().unwrap(),
            Some((_, replies)) => replies.front().cloned().unwrap(),
            None => Reply::ok(""),
        }
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute(&self, command: &str, hosts: &[HostName]) -> Result<CommandOutcome> {
        self.commands.lock().unwrap().push((command.to_string(), hosts.to_vec()));
        let reply = self.reply_for(command);
        let outputs = hosts
            .iter()
            .map(|host| HostOutput {
                host: host.clone(),
                exit_code: Some(reply.exit_code),
                stdout: reply.stdout.clone(),
                stderr: if reply.exit_code == 0 { String::new() } else { "mock failure".to_string() },
            })
            .collect();
        Ok(CommandOutcome::new(command, outputs))
    }
}

/// Records transfers; downloads create `local_dir/<host>/` with one marker file.
#[derive(Debug, Default)]
pub struct MockTransfer {
    pub puts: Mutex<Vec<(Vec<HostName>, Vec<PathBuf>, String)>>,
    pub gets: Mutex<Vec<(Vec<HostName>, Vec<String>, PathBuf)>>,
}

impl MockTransfer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileTransfer for MockTransfer {
    async fn put(&self, hosts: &[HostName], local_paths: &[PathBuf], remote_dir: &str) -> Result<()> {
        for path in local_paths {
            if !path.exists() {
                return Err(Error::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, path.display().to_string())));
            }
        }
        self.puts.lock().unwrap().push((hosts.to_vec(), local_paths.to_vec(), remote_dir.to_string()));
        Ok(())
    }

    async fn get(&self, hosts: &[HostName], remote_paths: &[String], local_dir: &Path) -> Result<()> {
        for host in hosts {
            let host_dir = local_dir.join(host.as_str());
            fs::create_dir_all(&host_dir)?;
            fs::write(host_dir.join("fetched"), remote_paths.join("\n"))?;
        }
        self.gets.lock().unwrap().push((hosts.to_vec(), remote_paths.to_vec(), local_dir.to_path_buf()));
        Ok(())
    }
}

/// Scheduler whose jobs run on fixed nodes per site. Job states are handed out in
/// order across every `job_info` call, the last one repeating.
#[derive(Debug, Default)]
pub struct MockScheduler {
    pub nodes: BTreeMap<String, Vec<HostName>>,
    pub states: Mutex<VecDeque<JobState>>,
    pub rejected_sites: Vec<String>,
    pub submitted: Mutex<Vec<(SiteName, JobRequest)>>,
    pub deleted: Mutex<Vec<JobId>>,
    pub deployments: Mutex<Vec<Vec<HostName>>>,
    /// Hosts reported as failed by every deployment.
    pub failing_deploys: Vec<HostName>,
    /// 1-based `job_info` calls answered with an API error.
    pub failing_job_info: Vec<usize>,
    job_info_calls: Mutex<usize>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(mut self, site: &str, hosts: &[&str]) -> Self {
        self.nodes.insert(site.to_string(), hosts.iter().map(|h| HostName::new(*h)).collect());
        self
    }

    pub fn with_states(self, states: Vec<JobState>) -> Self {
        *self.states.lock().unwrap() = states.into();
        self
    }

    pub fn rejecting(mut self, site: &str) -> Self {
        self.rejected_sites.push(site.to_string());
        self
    }

    pub fn failing_job_info(mut self, calls: &[usize]) -> Self {
        self.failing_job_info = calls.to_vec();
        self
    }

    pub fn job_info_calls(&self) -> usize {
        *self.job_info_calls.lock().unwrap()
    }

    pub fn submissions(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<JobId> {
        self.deleted.lock().unwrap().clone()
    }

    fn next_state(&self) -> JobState {
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            states.pop_front().unwrap()
        } else {
            states.front().cloned().unwrap_or(JobState::Running)
        }
    }
}

#[async_trait]
impl TestbedScheduler for MockScheduler {
    async fn submit_job(&self, site: &SiteName, request: &JobRequest) -> Result<JobId> {
        if self.rejected_sites.iter().any(|s| s == site.as_str()) {
            return Err(Error::SchedulingFailure(format!("no capacity on {}", site)));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push((site.clone(), request.clone()));
        Ok(JobId::new(format!("{}", 1000 + submitted.len())))
    }

    async fn job_info(&self, site: &SiteName, _job_id: &JobId) -> Result<JobInfo> {
        let call = {
            let mut calls = self.job_info_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if self.failing_job_info.contains(&call) {
            return Err(Error::SchedulingFailure(format!("job API unavailable on {}", site)));
        }
        Ok(JobInfo { state: self.next_state(), assigned_nodes: self.nodes.get(site.as_str()).cloned().unwrap_or_default() })
    }

    async fn delete_job(&self, _site: &SiteName, job_id: &JobId) -> Result<()> {
        self.deleted.lock().unwrap().push(job_id.clone());
        Ok(())
    }

    async fn submit_deployment(&self, _site: &SiteName, hosts: &[HostName], _image: &str) -> Result<DeploymentId> {
        let mut deployments = self.deployments.lock().unwrap();
        deployments.push(hosts.to_vec());
        Ok(DeploymentId::new(format!("D-{}", deployments.len())))
    }

    async fn deployment_status(&self, _site: &SiteName, _deployment: &DeploymentId) -> Result<DeploymentStatus> {
        let deployments = self.deployments.lock().unwrap();
        let hosts = deployments.last().cloned().unwrap_or_default();
        Ok(DeploymentStatus::Terminated { deployed: hosts.into_iter().filter(|h| !self.failing_deploys.contains(h)).collect() })
    }
}

pub fn hosts(names: &[&str]) -> Vec<HostName> {
    names.iter().map(|n| HostName::new(*n)).collect()
}

fn list_json(items: Vec<String>) -> String {
    format!(r#"{{"items": [{}]}}"#, items.join(","))
}

fn item_json(name: &str, condition: &str, status: &str) -> String {
    format!(r#"{{"metadata": {{"name": "{}"}}, "status": {{"conditions": [{{"type": "{}", "status": "{}"}}]}}}}"#, name, condition, status)
}

pub fn ready_json(names: &[&str]) -> String {
    list_json(names.iter().map(|n| item_json(n, "Ready", "True")).collect())
}

pub fn not_ready_json(names: &[&str]) -> String {
    list_json(names.iter().map(|n| item_json(n, "Ready", "False")).collect())
}

pub fn jobs_json(names: &[&str], condition: &str) -> String {
    list_json(names.iter().map(|n| item_json(n, condition, "True")).collect())
}

/// Copies the shipped manifest directories into `target` so rendering never touches the repository.
pub fn copy_manifests(target: &Path) -> PathBuf {
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("manifests");
    let root = target.join("manifests");
    for entry in fs::read_dir(&source).unwrap() {
        let dir = entry.unwrap().path();
        let copy = root.join(dir.file_name().unwrap());
        fs::create_dir_all(&copy).unwrap();
        for file in fs::read_dir(&dir).unwrap() {
            let file = file.unwrap().path();
            fs::copy(&file, copy.join(file.file_name().unwrap())).unwrap();
        }
    }
    root
}

/// Writes a one-cluster experiment config (`paravance` on `rennes`, 2 databases,
/// 1 application, 1 client) and returns its path.
pub fn write_config(dir: &Path, concurrency: &[i64]) -> PathBuf {
    let manifests = copy_manifests(dir);
    let config = format!(
        r#"walltime: "01:00:00"
exp_env:
  clusters:
    - cluster: paravance
      site: rennes
  n_antidotedb_per_dc: 2
  n_fmke_app_per_dc: 1
  n_fmke_client_per_dc: 1
  antidote_yaml_path: {m}/antidotedb
  fmke_yaml_path: {m}/fmke
  volume_yaml_path: {m}/volumes
  results_dir: {r}
  timeouts:
    readiness_s: 30
    populate_s: 30
    client_grace_s: 30
parameters:
  iteration: 1
  concurrent_clients: {c:?}
"#,
        m = manifests.display(),
        r = dir.join("results").display(),
        c = concurrency
    );
    let path = dir.join("experiment.yaml");
    fs::write(&path, config).unwrap();
    path
}
