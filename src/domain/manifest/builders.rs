//! Typed parameters for every generated manifest.
//!
//! Each struct turns into the [`Substitutions`] of its template. List and map values are
//! rendered as JSON, which YAML accepts as flow syntax.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::manifest::template::Substitutions;

/// Label key carrying a worker's sub-role.
pub const SERVICE_LABEL: &str = "service_g5k";
/// Label key carrying a worker's testbed cluster.
pub const CLUSTER_LABEL: &str = "cluster_g5k";

pub trait ManifestParams {
    fn substitutions(&self) -> Substitutions;
}

fn flow<T: Serialize + ?Sized>(value: &T) -> String {
    // Serializing strings, numbers and maps of them cannot fail.
    serde_json::to_string(value).unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeSelector(pub BTreeMap<String, String>);

impl NodeSelector {
    /// Pins pods to the workers labelled with `service` in testbed cluster `cluster`.
    pub fn service_in_cluster(service: &str, cluster: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(SERVICE_LABEL.to_string(), service.to_string());
        labels.insert(CLUSTER_LABEL.to_string(), cluster.to_string());
        Self(labels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct StatefulSetParams {
    pub name: String,
    pub replicas: usize,
    pub node_selector: NodeSelector,
    pub env: Vec<EnvVar>,
}

impl ManifestParams for StatefulSetParams {
    fn substitutions(&self) -> Substitutions {
        let mut subs = Substitutions::new();
        subs.insert("name".to_string(), self.name.clone());
        subs.insert("replicas".to_string(), self.replicas.to_string());
        subs.insert("node_selector".to_string(), flow(&self.node_selector));
        subs.insert("env".to_string(), flow(&self.env));
        subs
    }
}

/// Run-to-completion job: DC creation/linking, data population, load generation.
#[derive(Debug, Clone)]
pub struct JobParams {
    pub name: String,
    pub parallelism: usize,
    pub completions: usize,
    pub args: Vec<String>,
    pub node_selector: NodeSelector,
    pub post_start_command: Vec<String>,
}

impl JobParams {
    pub fn single(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parallelism: 1,
            completions: 1,
            args,
            node_selector: NodeSelector::default(),
            post_start_command: Vec::new(),
        }
    }
}

impl ManifestParams for JobParams {
    fn substitutions(&self) -> Substitutions {
        let mut subs = Substitutions::new();
        subs.insert("name".to_string(), self.name.clone());
        subs.insert("parallelism".to_string(), self.parallelism.to_string());
        subs.insert("completions".to_string(), self.completions.to_string());
        subs.insert("args".to_string(), flow(&self.args));
        subs.insert("node_selector".to_string(), flow(&self.node_selector));
        subs.insert("post_start_command".to_string(), flow(&self.post_start_command));
        subs
    }
}

/// Service exposing the first database pod of a data center.
#[derive(Debug, Clone)]
pub struct ExposerServiceParams {
    pub name: String,
    pub pod_name: String,
}

impl ManifestParams for ExposerServiceParams {
    fn substitutions(&self) -> Substitutions {
        let mut subs = Substitutions::new();
        subs.insert("name".to_string(), self.name.clone());
        subs.insert("pod_name".to_string(), self.pod_name.clone());
        subs
    }
}

/// Load-generator config: application endpoints and client concurrency.
#[derive(Debug, Clone)]
pub struct ClientConfigParams {
    pub addresses: Vec<String>,
    pub port: u16,
    pub concurrency: usize,
}

impl ManifestParams for ClientConfigParams {
    fn substitutions(&self) -> Substitutions {
        let ports = vec![self.port; self.addresses.len()];
        let mut subs = Substitutions::new();
        subs.insert("addresses".to_string(), flow(&self.addresses));
        subs.insert("ports".to_string(), flow(&ports));
        subs.insert("concurrency".to_string(), self.concurrency.to_string());
        subs
    }
}

/// Static manifests copied as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParams;

impl ManifestParams for NoParams {
    fn substitutions(&self) -> Substitutions {
        Substitutions::new()
    }
}
