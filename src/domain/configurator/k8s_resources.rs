use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::configurator::readiness::{ReadinessCondition, resource_names};
use crate::domain::manifest::workspace::ManifestDir;
use crate::domain::remote::command_result::HostFailure;
use crate::domain::remote::executor::CommandExecutor;
use crate::domain::remote::transfer::FileTransfer;
use crate::domain::utils::backoff::{Backoff, poll_until};
use crate::domain::utils::id::HostName;
use crate::error::{Error, Result};

/// Directory on the control plane receiving uploaded manifests.
pub const REMOTE_MANIFEST_DIR: &str = "/tmp/manifests";

/// Wraps `s` in single quotes for the remote shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Drives the orchestration cluster with `kubectl` run on the control-plane host.
#[derive(Debug, Clone)]
pub struct K8sResources {
    executor: Arc<dyn CommandExecutor>,
    transfer: Arc<dyn FileTransfer>,
    master: HostName,
    backoff: Backoff,
}

impl K8sResources {
    pub fn new(executor: Arc<dyn CommandExecutor>, transfer: Arc<dyn FileTransfer>, master: HostName) -> Self {
        Self { executor, transfer, master, backoff: Backoff::default() }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn master(&self) -> &HostName {
        &self.master
    }

    async fn kubectl(&self, args: &str) -> Result<String> {
        self.executor.run_on(&format!("kubectl {}", args), &self.master).await
    }

    /// Uploads `files` to the control plane and applies them in `namespace`
    /// (the current context's namespace when `None`).
    ///
    /// Files are uploaded per source directory so equally named manifests of two
    /// directories never overwrite each other.
    pub async fn deploy(&self, files: &[PathBuf], namespace: Option<&str>) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let mut per_dir: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for file in files {
            let dir_name = file.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()).unwrap_or("root");
            per_dir.entry(format!("{}/{}", REMOTE_MANIFEST_DIR, dir_name)).or_default().push(file.clone());
        }

        let mut apply = String::from("kubectl apply");
        let master = std::slice::from_ref(&self.master);
        for (remote_dir, local_files) in &per_dir {
            self.executor.run(&format!("mkdir -p {}", remote_dir), master).await?;
            self.transfer.put(master, local_files, remote_dir).await?;
            for file in local_files {
                let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                apply.push_str(&format!(" -f {}/{}", remote_dir, name));
            }
        }
        if let Some(namespace) = namespace {
            apply.push_str(&format!(" -n {}", namespace));
        }

        log::info!("Applying {} manifest(s) in namespace {}", files.len(), namespace.unwrap_or("<current>"));
        let outcome = self.executor.execute(&apply, master).await?;
        if !outcome.is_success() {
            return Err(Error::ManifestApplyFailure { files: files.to_vec(), reason: HostFailure::summary(&outcome.failures()) });
        }
        Ok(())
    }

    /// Applies every manifest of `dir`. Templates are skipped.
    pub async fn deploy_dir(&self, dir: &ManifestDir, namespace: Option<&str>) -> Result<()> {
        let manifests = dir.manifests()?;
        self.deploy(&manifests, namespace).await
    }

    /// Blocks until every resource matching `selector` satisfies `condition`.
    ///
    /// Fails with [`Error::ReadinessTimeout`] once `timeout` has elapsed, and with
    /// [`Error::ResourceFailed`] as soon as a job reports a failure.
    pub async fn wait_ready(&self, selector: &str, condition: ReadinessCondition, timeout: Duration, namespace: &str) -> Result<()> {
        log::info!("Waiting up to {:?} for {} '{}' in namespace {}", timeout, condition, selector, namespace);
        let selector_arg = if selector.is_empty() { String::new() } else { format!(" -l {}", shell_quote(selector)) };
        let command = format!("get {}{} -n {} -o json", condition.kind(), selector_arg, namespace);
        let command = &command;

        poll_until(
            timeout,
            self.backoff,
            || async move {
                let readiness = condition.evaluate(&self.kubectl(command).await?)?;
                if let Some((name, reason)) = readiness.failed {
                    return Err(Error::ResourceFailed { name, reason });
                }
                log::debug!("{}/{} {} '{}' satisfy {}", readiness.ready, readiness.total, condition.kind(), selector, condition);
                Ok(readiness.is_satisfied().then_some(()))
            },
            || Error::ReadinessTimeout { selector: selector.to_string(), condition: condition.to_string(), namespace: namespace.to_string(), timeout },
        )
        .await
    }

    /// Deletes `namespace` with everything in it, then creates it again.
    pub async fn reset_namespace(&self, namespace: &str) -> Result<()> {
        log::info!("Deleting every resource of namespace {}", namespace);
        self.kubectl(&format!("delete namespace {} --ignore-not-found --wait=true", namespace)).await?;
        self.create_namespace(namespace).await
    }

    /// Creates `namespace` if missing and makes it the current context's namespace.
    pub async fn create_namespace(&self, namespace: &str) -> Result<()> {
        self.executor
            .run_on(
                &format!(
                    "kubectl create namespace {ns} --dry-run=client -o yaml | kubectl apply -f - && kubectl config set-context --current --namespace={ns}",
                    ns = namespace
                ),
                &self.master,
            )
            .await?;
        Ok(())
    }

    pub async fn label_node(&self, node: &HostName, key: &str, value: &str) -> Result<()> {
        self.kubectl(&format!("label node {} {}={} --overwrite", node, key, value)).await?;
        Ok(())
    }

    pub async fn nodes_with_label(&self, key: &str, value: &str) -> Result<Vec<HostName>> {
        let json = self.kubectl(&format!("get nodes -l {} -o json", shell_quote(&format!("{}={}", key, value)))).await?;
        Ok(resource_names(&json)?.into_iter().map(HostName::new).collect())
    }

    /// Pod names matching `selector`, sorted.
    pub async fn pods_with_label(&self, selector: &str, namespace: &str) -> Result<Vec<String>> {
        let json = self.kubectl(&format!("get pods -l {} -n {} -o json", shell_quote(selector), namespace)).await?;
        let mut names = resource_names(&json)?;
        names.sort();
        Ok(names)
    }

    pub async fn pod_ip(&self, pod: &str, namespace: &str) -> Result<String> {
        self.jsonpath("pod", pod, namespace, "{.status.podIP}").await
    }

    pub async fn service_ip(&self, service: &str, namespace: &str) -> Result<String> {
        self.jsonpath("service", service, namespace, "{.spec.clusterIP}").await
    }

    pub async fn pod_logs(&self, pod: &str, namespace: &str) -> Result<String> {
        self.kubectl(&format!("logs {} -n {}", pod, namespace)).await
    }

    async fn jsonpath(&self, kind: &str, name: &str, namespace: &str, path: &str) -> Result<String> {
        let value = self.kubectl(&format!("get {} {} -n {} -o jsonpath={}", kind, name, namespace, shell_quote(path))).await?;
        if value.is_empty() {
            return Err(Error::ResourceFailed { name: format!("{}/{}", kind, name), reason: format!("{} is not set", path) });
        }
        Ok(value)
    }
}
