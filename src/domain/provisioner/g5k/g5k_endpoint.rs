use crate::domain::utils::id::{DeploymentId, JobId, SiteName};

/// Grid'5000 REST resources used by the provisioner.
#[derive(Debug)]
pub enum G5kEndpoint<'a> {
    Jobs { site: &'a SiteName },
    Job { site: &'a SiteName, job_id: &'a JobId },
    Deployments { site: &'a SiteName },
    Deployment { site: &'a SiteName, deployment: &'a DeploymentId },
}

impl G5kEndpoint<'_> {
    pub fn path(&self) -> String {
        match self {
            Self::Jobs { site } => format!("/sites/{}/jobs", site),
            Self::Job { site, job_id } => format!("/sites/{}/jobs/{}", site, job_id),
            Self::Deployments { site } => format!("/sites/{}/deployments", site),
            Self::Deployment { site, deployment } => format!("/sites/{}/deployments/{}", site, deployment),
        }
    }

    pub fn url(&self, api_url: &str) -> String {
        format!("{}{}", api_url.trim_end_matches('/'), self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_job_url() {
        let site = SiteName::new("rennes");
        let job_id = JobId::new("1907");
        let endpoint = G5kEndpoint::Job { site: &site, job_id: &job_id };
        assert_eq!(endpoint.url("https://api.grid5000.fr/stable/"), "https://api.grid5000.fr/stable/sites/rennes/jobs/1907");
    }
}
