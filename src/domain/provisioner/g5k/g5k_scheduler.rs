use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response};

use crate::domain::provisioner::g5k::g5k_endpoint::G5kEndpoint;
use crate::domain::provisioner::g5k::response::{G5kDeploymentResponse, G5kDeploymentSubmission, G5kJobResponse, G5kJobSubmission};
use crate::domain::provisioner::scheduler_trait::{DeploymentStatus, JobInfo, JobRequest, JobState, TestbedScheduler};
use crate::domain::utils::id::{DeploymentId, HostName, JobId, SiteName};
use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.grid5000.fr/stable";

#[derive(Debug, Clone)]
pub struct G5kCredentials {
    pub username: String,
    pub password: String,
}

/// [`TestbedScheduler`] talking to the Grid'5000 REST API (OAR jobs and kadeploy deployments).
#[derive(Debug)]
pub struct G5kScheduler {
    client: reqwest::Client,
    api_url: String,
    credentials: Option<G5kCredentials>,
    /// Public key installed on freshly deployed nodes.
    ssh_public_key: Option<String>,
}

impl G5kScheduler {
    pub fn new(api_url: impl Into<String>, credentials: Option<G5kCredentials>, ssh_public_key: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self { client, api_url: api_url.into(), credentials, ssh_public_key })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => request.basic_auth(&credentials.username, Some(&credentials.password)),
            None => request,
        }
    }

    /// Builds the OAR resource expression, e.g. `{cluster='paravance'}/nodes=3,walltime=02:00:00`.
    pub fn resource_expression(request: &JobRequest) -> String {
        format!("{},walltime={}", request.resources, request.walltime)
    }

    async fn rejected(site: &SiteName, what: &str, response: Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        log::error!("{} on site {} was rejected. Response-Status-Code: <<{}>> Response-Body: <<{}>>", what, site, status, body);
        Error::SchedulingFailure(format!("{} on site {} rejected with status {}: {}", what, site, status, body.trim()))
    }
}

#[async_trait]
impl TestbedScheduler for G5kScheduler {
    async fn submit_job(&self, site: &SiteName, request: &JobRequest) -> Result<JobId> {
        let body = G5kJobSubmission {
            resources: Self::resource_expression(request),
            command: "sleep infinity".to_string(),
            name: request.name.clone(),
            types: if request.deploy { vec!["deploy".to_string()] } else { Vec::new() },
            reservation: request.start_date.clone(),
        };

        let url = G5kEndpoint::Jobs { site }.url(&self.api_url);
        log::debug!("Submitting job to {}: {:?}", url, body);
        let response = self.authorize(self.client.post(url).json(&body)).send().await?;

        if !response.status().is_success() {
            return Err(Self::rejected(site, "Job submission", response).await);
        }

        let job: G5kJobResponse = response.json().await?;
        Ok(JobId::new(job.uid.to_string()))
    }

    async fn job_info(&self, site: &SiteName, job_id: &JobId) -> Result<JobInfo> {
        let url = G5kEndpoint::Job { site, job_id }.url(&self.api_url);
        let job: G5kJobResponse = self.authorize(self.client.get(url)).send().await?.error_for_status()?.json().await?;

        Ok(JobInfo { state: JobState::parse(&job.state), assigned_nodes: job.assigned_nodes.into_iter().map(HostName::new).collect() })
    }

    async fn delete_job(&self, site: &SiteName, job_id: &JobId) -> Result<()> {
        let url = G5kEndpoint::Job { site, job_id }.url(&self.api_url);
        self.authorize(self.client.delete(url)).send().await?.error_for_status()?;
        Ok(())
    }

    async fn submit_deployment(&self, site: &SiteName, hosts: &[HostName], image: &str) -> Result<DeploymentId> {
        let body = G5kDeploymentSubmission {
            nodes: hosts.iter().map(|host| host.to_string()).collect(),
            environment: image.to_string(),
            key: self.ssh_public_key.clone(),
        };

        let url = G5kEndpoint::Deployments { site }.url(&self.api_url);
        let response = self.authorize(self.client.post(url).json(&body)).send().await?;

        if !response.status().is_success() {
            return Err(Self::rejected(site, "Deployment submission", response).await);
        }

        let deployment: G5kDeploymentResponse = response.json().await?;
        Ok(DeploymentId::new(deployment.uid))
    }

    async fn deployment_status(&self, site: &SiteName, deployment: &DeploymentId) -> Result<DeploymentStatus> {
        let url = G5kEndpoint::Deployment { site, deployment }.url(&self.api_url);
        let response: G5kDeploymentResponse = self.authorize(self.client.get(url)).send().await?.error_for_status()?.json().await?;

        let status = match response.status.as_str() {
            "processing" | "waiting" => DeploymentStatus::Processing,
            "terminated" => {
                let mut deployed: Vec<HostName> =
                    response.result.iter().filter(|(_, node)| node.state == "OK").map(|(host, _)| HostName::new(host.clone())).collect();
                deployed.sort();
                DeploymentStatus::Terminated { deployed }
            }
            other => DeploymentStatus::Error(other.to_string()),
        };
        Ok(status)
    }
}
