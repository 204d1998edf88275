use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::provisioner::reservation::{HostSet, JobHandle, NodeRequest, Reservation};
use crate::domain::provisioner::scheduler_trait::{DeploymentStatus, JobRequest, JobState, TestbedScheduler};
use crate::domain::utils::backoff::{Backoff, poll_until};
use crate::domain::utils::id::SiteName;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ProvisionerSettings {
    pub job_name: String,
    /// `HH:MM:SS`.
    pub walltime: String,
    pub start_date: Option<String>,
    /// Base OS image deployed on the nodes before use. Nodes keep their default OS when absent.
    pub image: Option<String>,
    pub resolve_timeout: Duration,
    pub deploy_timeout: Duration,
    pub job_state_timeout: Duration,
    pub backoff: Backoff,
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        Self {
            job_name: "testbed_bench".to_string(),
            walltime: "01:00:00".to_string(),
            start_date: None,
            image: None,
            resolve_timeout: Duration::from_secs(30 * 60),
            deploy_timeout: Duration::from_secs(30 * 60),
            job_state_timeout: Duration::from_secs(60),
            backoff: Backoff { initial: Duration::from_secs(5), max: Duration::from_secs(30), multiplier: 1.5 },
        }
    }
}

/// Reserves testbed nodes, waits for them and optionally re-images them.
#[derive(Debug)]
pub struct Provisioner {
    scheduler: Arc<dyn TestbedScheduler>,
    settings: ProvisionerSettings,
}

impl Provisioner {
    pub fn new(scheduler: Arc<dyn TestbedScheduler>, settings: ProvisionerSettings) -> Self {
        Self { scheduler, settings }
    }

    pub fn settings(&self) -> &ProvisionerSettings {
        &self.settings
    }

    /// Submits one job per site covering every requested cluster of that site.
    ///
    /// A rejected submission fails with [`Error::SchedulingFailure`]; jobs already
    /// submitted on other sites are deleted before returning the error.
    pub async fn reserve(&self, requests: &[NodeRequest], keep_alive: bool) -> Result<Reservation> {
        let mut per_site: BTreeMap<SiteName, Vec<&NodeRequest>> = BTreeMap::new();
        for request in requests.iter().filter(|r| r.nodes > 0) {
            per_site.entry(request.site.clone()).or_default().push(request);
        }

        if per_site.is_empty() {
            return Err(Error::SchedulingFailure("Reservation requests no node".to_string()));
        }

        let mut jobs = Vec::new();
        for (site, site_requests) in per_site {
            let resources: Vec<String> = site_requests.iter().map(|r| format!("{{cluster='{}'}}/nodes={}", r.cluster, r.nodes)).collect();
            let job_request = JobRequest {
                resources: resources.join("+"),
                walltime: self.settings.walltime.clone(),
                name: self.settings.job_name.clone(),
                deploy: self.settings.image.is_some(),
                start_date: self.settings.start_date.clone(),
            };

            log::info!("Reserving {} on site {}", job_request.resources, site);
            match self.scheduler.submit_job(&site, &job_request).await {
                Ok(job_id) => {
                    log::info!("Job {} submitted on site {}", job_id, site);
                    jobs.push(JobHandle { job_id, site });
                }
                Err(e) => {
                    self.release(&Reservation::new(jobs, false)).await;
                    return Err(e);
                }
            }
        }

        Ok(Reservation::new(jobs, keep_alive))
    }

    /// Waits until every job of the reservation runs and returns the assigned nodes.
    pub async fn resolve_hosts(&self, reservation: &Reservation) -> Result<HostSet> {
        let mut host_set = HostSet::new();

        for job in &reservation.jobs {
            let scheduler = &self.scheduler;
            let hosts = poll_until(
                self.settings.resolve_timeout,
                self.settings.backoff,
                || async move {
                    let info = scheduler.job_info(&job.site, &job.job_id).await?;
                    match info.state {
                        JobState::Running if !info.assigned_nodes.is_empty() => Ok(Some(info.assigned_nodes)),
                        JobState::Error | JobState::Terminated => {
                            Err(Error::SchedulingFailure(format!("Job {} is in state {:?}", job, info.state)))
                        }
                        state => {
                            log::debug!("Job {} is {:?}, waiting", job, state);
                            Ok(None)
                        }
                    }
                },
                || Error::ProvisioningTimeout { job: job.to_string(), waited: self.settings.resolve_timeout },
            )
            .await?;

            log::info!("Job {} runs on {} node(s)", job, hosts.len());
            host_set.add_site(job.site.clone(), hosts);
        }

        Ok(host_set)
    }

    /// Re-images every host with `image` and returns the hosts that came up.
    pub async fn deploy_os(&self, hosts: &HostSet, image: &str) -> Result<HostSet> {
        let mut deployed_set = HostSet::new();

        for (site, site_hosts) in hosts.by_site() {
            log::info!("Deploying image {} on {} node(s) of site {}", image, site_hosts.len(), site);
            let deployment = self.scheduler.submit_deployment(site, site_hosts, image).await?;

            let scheduler = &self.scheduler;
            let deployment_ref = &deployment;
            let deployed = poll_until(
                self.settings.deploy_timeout,
                self.settings.backoff,
                || async move {
                    match scheduler.deployment_status(site, deployment_ref).await? {
                        DeploymentStatus::Processing => Ok(None),
                        DeploymentStatus::Terminated { deployed } => Ok(Some(deployed)),
                        DeploymentStatus::Error(status) => {
                            Err(Error::SchedulingFailure(format!("Deployment {} on site {} ended with status {}", deployment_ref, site, status)))
                        }
                    }
                },
                || Error::ProvisioningTimeout { job: deployment.to_string(), waited: self.settings.deploy_timeout },
            )
            .await?;

            let undeployed: Vec<_> = site_hosts.iter().filter(|host| !deployed.contains(host)).collect();
            if !undeployed.is_empty() {
                log::warn!("{} node(s) of site {} failed to deploy: {:?}", undeployed.len(), site, undeployed);
            }

            let kept = site_hosts.iter().filter(|host| deployed.contains(host)).cloned().collect();
            deployed_set.add_site(site.clone(), kept);
        }

        Ok(deployed_set)
    }

    /// Adopts `existing` when given, submits new jobs otherwise. Nothing is waited for.
    pub async fn acquire(&self, requests: &[NodeRequest], existing: Option<Reservation>, keep_alive: bool) -> Result<Reservation> {
        match existing {
            Some(reservation) => {
                log::info!("Reusing reservation {}", reservation);
                Ok(reservation)
            }
            None => self.reserve(requests, keep_alive).await,
        }
    }

    /// Acquires a reservation (or adopts `existing`), resolves its nodes and deploys the image.
    ///
    /// The reservation is released when its nodes cannot be prepared, unless kept alive.
    /// Callers that must be able to release it while waiting use [`Provisioner::acquire`]
    /// and [`Provisioner::prepare_hosts`] instead.
    pub async fn provision(&self, requests: &[NodeRequest], existing: Option<Reservation>, keep_alive: bool) -> Result<(Reservation, HostSet)> {
        let reservation = self.acquire(requests, existing, keep_alive).await?;

        match self.prepare_hosts(&reservation).await {
            Ok(hosts) => Ok((reservation, hosts)),
            Err(e) => {
                if !reservation.keep_alive {
                    self.release(&reservation).await;
                }
                Err(e)
            }
        }
    }

    /// Waits for the nodes of `reservation` and deploys the image on them when one is set.
    pub async fn prepare_hosts(&self, reservation: &Reservation) -> Result<HostSet> {
        let hosts = self.resolve_hosts(reservation).await?;
        match &self.settings.image {
            Some(image) => self.deploy_os(&hosts, image).await,
            None => Ok(hosts),
        }
    }

    /// `false` as soon as one job of the reservation is in error or terminated.
    pub async fn is_job_alive(&self, reservation: &Reservation) -> Result<bool> {
        for job in &reservation.jobs {
            let scheduler = &self.scheduler;
            let state = poll_until(
                self.settings.job_state_timeout,
                self.settings.backoff,
                || async move {
                    let info = scheduler.job_info(&job.site, &job.job_id).await?;
                    Ok(match info.state {
                        JobState::Unknown(_) => None,
                        state => Some(state),
                    })
                },
                || Error::ProvisioningTimeout { job: job.to_string(), waited: self.settings.job_state_timeout },
            )
            .await?;

            if state.is_dead() {
                log::warn!("Job {} is {:?}", job, state);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Deletes every job of the reservation. Failures are logged, not returned.
    pub async fn release(&self, reservation: &Reservation) {
        for job in &reservation.jobs {
            match self.scheduler.delete_job(&job.site, &job.job_id).await {
                Ok(()) => log::info!("Job {} deleted", job),
                Err(e) => log::error!("Failed to delete job {}: {}", job, e),
            }
        }
    }
}
