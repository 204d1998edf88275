use serde::Deserialize;
use std::fmt;

use crate::error::Result;

/// A cluster-reported predicate polled until every matching resource satisfies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessCondition {
    PodReady,
    JobComplete,
    NodeReady,
}

impl ReadinessCondition {
    /// Resource kind as understood by `kubectl get`.
    pub fn kind(&self) -> &'static str {
        match self {
            ReadinessCondition::PodReady => "pods",
            ReadinessCondition::JobComplete => "jobs",
            ReadinessCondition::NodeReady => "nodes",
        }
    }

    fn condition_type(&self) -> &'static str {
        match self {
            ReadinessCondition::PodReady | ReadinessCondition::NodeReady => "Ready",
            ReadinessCondition::JobComplete => "Complete",
        }
    }

    /// Evaluates the output of `kubectl get <kind> -o json`.
    pub fn evaluate(&self, resource_list_json: &str) -> Result<Readiness> {
        let list: ResourceList = serde_json::from_str(resource_list_json)?;
        let mut readiness = Readiness { total: list.items.len(), ..Readiness::default() };

        for item in &list.items {
            if item.has_condition(self.condition_type()) {
                readiness.ready += 1;
            }
            if *self == ReadinessCondition::JobComplete && readiness.failed.is_none() {
                if let Some(failed) = item.status.conditions.iter().find(|c| c.kind == "Failed" && c.status == "True") {
                    let reason = failed.message.clone().or_else(|| failed.reason.clone()).unwrap_or_else(|| "job failed".to_string());
                    readiness.failed = Some((item.metadata.name.clone(), reason));
                }
            }
        }
        Ok(readiness)
    }
}

impl fmt::Display for ReadinessCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind(), self.condition_type())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    pub total: usize,
    pub ready: usize,
    /// First resource reporting a terminal failure, with its reason.
    pub failed: Option<(String, String)>,
}

impl Readiness {
    /// An empty match is never ready: resources may not have been created yet.
    pub fn is_satisfied(&self) -> bool {
        self.total > 0 && self.ready == self.total
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceList {
    #[serde(default)]
    pub items: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Resource {
    pub metadata: Metadata,
    #[serde(default)]
    pub status: Status,
}

impl Resource {
    fn has_condition(&self, kind: &str) -> bool {
        self.status.conditions.iter().any(|c| c.kind == kind && c.status == "True")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Metadata {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Status {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Names of the resources of a `kubectl get ... -o json` list.
pub(crate) fn resource_names(resource_list_json: &str) -> Result<Vec<String>> {
    let list: ResourceList = serde_json::from_str(resource_list_json)?;
    Ok(list.items.into_iter().map(|item| item.metadata.name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PODS: &str = r#"{"items": [
        {"metadata": {"name": "antidote-paravance-0"}, "status": {"conditions": [{"type": "Ready", "status": "True"}]}},
        {"metadata": {"name": "antidote-paravance-1"}, "status": {"conditions": [{"type": "Ready", "status": "False"}]}}
    ]}"#;

    #[test]
    fn counts_ready_pods() {
        let readiness = ReadinessCondition::PodReady.evaluate(PODS).unwrap();
        assert_eq!(readiness, Readiness { total: 2, ready: 1, failed: None });
        assert!(!readiness.is_satisfied());
    }

    #[test]
    fn empty_list_is_not_ready() {
        let readiness = ReadinessCondition::JobComplete.evaluate(r#"{"items": []}"#).unwrap();
        assert!(!readiness.is_satisfied());
    }

    #[test]
    fn reports_failed_job() {
        let jobs = r#"{"items": [{"metadata": {"name": "createdc-paravance"},
            "status": {"conditions": [{"type": "Failed", "status": "True", "reason": "BackoffLimitExceeded"}]}}]}"#;
        let readiness = ReadinessCondition::JobComplete.evaluate(jobs).unwrap();
        assert_eq!(readiness.failed, Some(("createdc-paravance".to_string(), "BackoffLimitExceeded".to_string())));
    }

    #[test]
    fn lists_resource_names() {
        assert_eq!(resource_names(PODS).unwrap(), vec!["antidote-paravance-0", "antidote-paravance-1"]);
    }
}
