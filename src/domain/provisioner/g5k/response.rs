use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /sites/{site}/jobs`.
#[derive(Debug, Serialize)]
pub struct G5kJobSubmission {
    pub resources: String,
    pub command: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation: Option<String>,
}

/// Job resource as returned by `GET /sites/{site}/jobs/{id}` and on submission.
#[derive(Debug, Deserialize)]
pub struct G5kJobResponse {
    pub uid: u64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub assigned_nodes: Vec<String>,
}

/// Body of `POST /sites/{site}/deployments`.
#[derive(Debug, Serialize)]
pub struct G5kDeploymentSubmission {
    pub nodes: Vec<String>,
    pub environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct G5kDeployedNode {
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct G5kDeploymentResponse {
    pub uid: String,
    pub status: String,
    #[serde(default)]
    pub result: HashMap<String, G5kDeployedNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_response_tolerates_missing_nodes() {
        let job: G5kJobResponse = serde_json::from_str(r#"{"uid": 1907, "state": "waiting"}"#).unwrap();
        assert_eq!(job.uid, 1907);
        assert!(job.assigned_nodes.is_empty());
    }

    #[test]
    fn submission_skips_empty_fields() {
        let body = G5kJobSubmission {
            resources: "{cluster='paravance'}/nodes=2,walltime=01:00:00".to_string(),
            command: "sleep infinity".to_string(),
            name: "bench".to_string(),
            types: Vec::new(),
            reservation: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("types").is_none());
        assert!(json.get("reservation").is_none());
    }
}
