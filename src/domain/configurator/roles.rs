use std::collections::BTreeMap;
use std::fmt;

use crate::domain::configurator::k8s_resources::K8sResources;
use crate::domain::manifest::builders::{CLUSTER_LABEL, SERVICE_LABEL};
use crate::domain::utils::id::{ClusterName, HostName};
use crate::error::{Error, Result};

/// Sub-role of a worker. Declaration order is the order in which workers are handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Database,
    Application,
    Client,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Database, Role::Application, Role::Client];

    /// Value of the `service_g5k` node label.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Database => "antidote",
            Role::Application => "fmke",
            Role::Client => "fmke_client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Workers wanted per role in every testbed cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleCounts {
    pub database: usize,
    pub application: usize,
    pub client: usize,
}

impl RoleCounts {
    pub fn of(&self, role: Role) -> usize {
        match role {
            Role::Database => self.database,
            Role::Application => self.application,
            Role::Client => self.client,
        }
    }

    pub fn total(&self) -> usize {
        self.database + self.application + self.client
    }
}

/// Role wanted `wanted` workers in `cluster` but only got `assigned`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleShortfall {
    pub cluster: ClusterName,
    pub role: Role,
    pub wanted: usize,
    pub assigned: usize,
}

impl fmt::Display for RoleShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {}/{} worker(s)", self.role, self.cluster, self.assigned, self.wanted)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerGroup {
    pub roles: BTreeMap<Role, Vec<HostName>>,
    /// Workers left over once every role got its count.
    pub spare: Vec<HostName>,
}

impl WorkerGroup {
    pub fn hosts(&self, role: Role) -> &[HostName] {
        self.roles.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Control plane plus per-cluster worker groups. No worker holds two roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    master: HostName,
    counts: RoleCounts,
    groups: BTreeMap<ClusterName, WorkerGroup>,
}

impl RoleAssignment {
    /// Splits every host but `master` by testbed cluster, then hands each cluster's
    /// workers out in host order: database first, application next, client last.
    ///
    /// A cluster short of workers gets a partial assignment, see [`RoleAssignment::shortfalls`].
    /// Every cluster of `clusters` gets a group, even without hosts.
    pub fn compute(hosts: &[HostName], master: &HostName, clusters: &[ClusterName], counts: RoleCounts) -> Self {
        let mut workers: BTreeMap<ClusterName, Vec<HostName>> = clusters.iter().map(|c| (c.clone(), Vec::new())).collect();
        for host in hosts.iter().filter(|host| *host != master) {
            workers.entry(host.cluster()).or_default().push(host.clone());
        }

        let groups = workers
            .into_iter()
            .map(|(cluster, hosts)| {
                let mut remaining = hosts.into_iter();
                let mut group = WorkerGroup::default();
                for role in Role::ALL {
                    let taken: Vec<HostName> = remaining.by_ref().take(counts.of(role)).collect();
                    group.roles.insert(role, taken);
                }
                group.spare = remaining.collect();
                (cluster, group)
            })
            .collect();

        Self { master: master.clone(), counts, groups }
    }

    pub fn master(&self) -> &HostName {
        &self.master
    }

    pub fn counts(&self) -> RoleCounts {
        self.counts
    }

    pub fn groups(&self) -> &BTreeMap<ClusterName, WorkerGroup> {
        &self.groups
    }

    pub fn group(&self, cluster: &ClusterName) -> Option<&WorkerGroup> {
        self.groups.get(cluster)
    }

    /// Every host holding `role`, across clusters.
    pub fn hosts_with_role(&self, role: Role) -> Vec<HostName> {
        self.groups.values().flat_map(|group| group.hosts(role).iter().cloned()).collect()
    }

    pub fn role_of(&self, host: &HostName) -> Option<Role> {
        self.groups.values().find_map(|group| group.roles.iter().find(|(_, hosts)| hosts.contains(host)).map(|(role, _)| *role))
    }

    pub fn shortfalls(&self) -> Vec<RoleShortfall> {
        let mut shortfalls = Vec::new();
        for (cluster, group) in &self.groups {
            for role in Role::ALL {
                let wanted = self.counts.of(role);
                let assigned = group.hosts(role).len();
                if assigned < wanted {
                    shortfalls.push(RoleShortfall { cluster: cluster.clone(), role, wanted, assigned });
                }
            }
        }
        shortfalls
    }

    /// Rejects an assignment where any role got fewer workers than requested.
    pub fn validate(&self) -> Result<()> {
        let shortfalls = self.shortfalls();
        if shortfalls.is_empty() {
            return Ok(());
        }
        let details: Vec<String> = shortfalls.iter().map(RoleShortfall::to_string).collect();
        Err(Error::ConfigValidation(format!("Not enough workers for the requested roles: {}", details.join(", "))))
    }

    /// Labels every worker with its testbed cluster and, when it holds one, its role.
    pub async fn apply_labels(&self, k8s: &K8sResources) -> Result<()> {
        for (cluster, group) in &self.groups {
            for (role, hosts) in &group.roles {
                for host in hosts {
                    k8s.label_node(host, CLUSTER_LABEL, cluster.as_str()).await?;
                    k8s.label_node(host, SERVICE_LABEL, role.label()).await?;
                }
            }
            for host in &group.spare {
                k8s.label_node(host, CLUSTER_LABEL, cluster.as_str()).await?;
            }
            log::info!(
                "Cluster {}: {} database, {} application, {} client, {} spare worker(s)",
                cluster,
                group.hosts(Role::Database).len(),
                group.hosts(Role::Application).len(),
                group.hosts(Role::Client).len(),
                group.spare.len()
            );
        }
        Ok(())
    }
}
