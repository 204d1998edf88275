use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::domain::remote::command_result::HostFailure;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON document: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to parse YAML document: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Request to the testbed API failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid experiment configuration: {0}")]
    ConfigValidation(String),

    /// The scheduler refused the reservation (no capacity, invalid site) or reported it errored.
    #[error("Scheduling failure: {0}")]
    SchedulingFailure(String),

    #[error("Nodes of job {job} were not reachable after {waited:?}")]
    ProvisioningTimeout { job: String, waited: Duration },

    #[error("Command '{command}' failed on {} host(s): {}", failures.len(), HostFailure::summary(failures))]
    RemoteCommandFailure { command: String, failures: Vec<HostFailure> },

    #[error("Cluster rejected manifests {files:?}: {reason}")]
    ManifestApplyFailure { files: Vec<PathBuf>, reason: String },

    #[error("Resources '{selector}' in namespace '{namespace}' did not reach condition {condition} within {timeout:?}")]
    ReadinessTimeout { selector: String, condition: String, namespace: String, timeout: Duration },

    #[error("Resource {name} reported a failed condition: {reason}")]
    ResourceFailed { name: String, reason: String },

    #[error("Template {template} references placeholder '{placeholder}' without a value")]
    MissingPlaceholder { template: PathBuf, placeholder: String },

    #[error("Rendered manifest {path} is not valid: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("No pending combination left in the sweep")]
    EmptySweep,

    #[error("Combination {combination} is already {state}")]
    InvalidSweepTransition { combination: String, state: String },

    #[error("Combination {0} is not part of the sweep")]
    UnknownCombination(String),
}

pub type Result<T> = std::result::Result<T, Error>;
