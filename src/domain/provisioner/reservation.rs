use std::collections::BTreeMap;
use std::fmt;

use crate::domain::utils::id::{ClusterName, HostName, JobId, SiteName};
use crate::error::{Error, Result};

/// One scheduler job, identified by its id on a given site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: JobId,
    pub site: SiteName,
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.job_id, self.site)
    }
}

/// A lease on testbed nodes: one job per site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub jobs: Vec<JobHandle>,
    /// Reserved nodes outlive the driver when set.
    pub keep_alive: bool,
}

impl Reservation {
    pub fn new(jobs: Vec<JobHandle>, keep_alive: bool) -> Self {
        Self { jobs, keep_alive }
    }

    /// Parses existing job ids given as `id:site[,id:site...]`.
    pub fn parse_job_ids(spec: &str, keep_alive: bool) -> Result<Self> {
        let mut jobs = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (job_id, site) = entry
                .split_once(':')
                .ok_or_else(|| Error::ConfigValidation(format!("Job id '{}' is not of the form <id>:<site>", entry)))?;
            if job_id.is_empty() || site.is_empty() {
                return Err(Error::ConfigValidation(format!("Job id '{}' is not of the form <id>:<site>", entry)));
            }
            jobs.push(JobHandle { job_id: JobId::new(job_id), site: SiteName::new(site) });
        }

        if jobs.is_empty() {
            return Err(Error::ConfigValidation("No job id given".to_string()));
        }
        Ok(Self::new(jobs, keep_alive))
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let jobs: Vec<String> = self.jobs.iter().map(JobHandle::to_string).collect();
        write!(f, "{}", jobs.join(","))
    }
}

/// Number of nodes wanted from one testbed cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRequest {
    pub cluster: ClusterName,
    pub site: SiteName,
    pub nodes: usize,
}

/// Reachable nodes of a reservation, in scheduler order, also indexed by site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSet {
    hosts: Vec<HostName>,
    by_site: BTreeMap<SiteName, Vec<HostName>>,
}

impl HostSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_site(&mut self, site: SiteName, hosts: Vec<HostName>) {
        self.hosts.extend(hosts.iter().cloned());
        self.by_site.entry(site).or_default().extend(hosts);
    }

    pub fn hosts(&self) -> &[HostName] {
        &self.hosts
    }

    pub fn by_site(&self) -> &BTreeMap<SiteName, Vec<HostName>> {
        &self.by_site
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// First host of the given testbed cluster.
    pub fn first_of_cluster(&self, cluster: &ClusterName) -> Option<&HostName> {
        self.hosts.iter().find(|host| &host.cluster() == cluster)
    }

    /// Every host except `excluded`.
    pub fn without(&self, excluded: &HostName) -> Vec<HostName> {
        self.hosts.iter().filter(|host| *host != excluded).cloned().collect()
    }
}
