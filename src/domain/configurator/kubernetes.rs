use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::configurator::k8s_resources::K8sResources;
use crate::domain::configurator::packages::PackagesConfigurator;
use crate::domain::configurator::readiness::ReadinessCondition;
use crate::domain::manifest::workspace::ManifestDir;
use crate::domain::remote::executor::CommandExecutor;
use crate::domain::remote::transfer::FileTransfer;
use crate::domain::utils::id::HostName;
use crate::error::{Error, Result};

/// Remote location of the admin kubeconfig on the control plane.
pub const REMOTE_KUBECONFIG: &str = ".kube/config";

#[derive(Debug, Clone)]
pub struct KubernetesSettings {
    /// Minor release of the package repository, e.g. `v1.29`.
    pub version: String,
    pub pod_network_cidr: String,
    pub network_manifest_url: String,
    pub node_ready_timeout: Duration,
    pub volumes_per_worker: usize,
    /// Scratch partition mounted on `/tmp` of every worker to back local volumes.
    pub volume_device: String,
    pub volume_provisioner_timeout: Duration,
}

impl Default for KubernetesSettings {
    fn default() -> Self {
        Self {
            version: "v1.29".to_string(),
            pod_network_cidr: "10.244.0.0/16".to_string(),
            network_manifest_url: "https://github.com/flannel-io/flannel/releases/latest/download/kube-flannel.yml".to_string(),
            node_ready_timeout: Duration::from_secs(300),
            volumes_per_worker: 3,
            volume_device: "/dev/sda5".to_string(),
            volume_provisioner_timeout: Duration::from_secs(300),
        }
    }
}

/// Bootstraps a kubeadm cluster: one control plane, every other host a worker.
#[derive(Debug, Clone)]
pub struct KubernetesConfigurator {
    executor: Arc<dyn CommandExecutor>,
    transfer: Arc<dyn FileTransfer>,
    packages: PackagesConfigurator,
    settings: KubernetesSettings,
}

impl KubernetesConfigurator {
    pub fn new(executor: Arc<dyn CommandExecutor>, transfer: Arc<dyn FileTransfer>, settings: KubernetesSettings) -> Self {
        let packages = PackagesConfigurator::new(executor.clone());
        Self { executor, transfer, packages, settings }
    }

    pub fn settings(&self) -> &KubernetesSettings {
        &self.settings
    }

    /// Installs kubeadm on `hosts`, initialises `master` and joins every other host.
    ///
    /// Returns once every node reports `Ready`.
    pub async fn deploy_cluster(&self, hosts: &[HostName], master: &HostName, k8s: &K8sResources) -> Result<()> {
        if !hosts.contains(master) {
            return Err(Error::ConfigValidation(format!("Control plane {} is not one of the reserved hosts", master)));
        }
        let workers: Vec<HostName> = hosts.iter().filter(|host| *host != master).cloned().collect();

        log::info!("Deploying Kubernetes on {} host(s), control plane {}", hosts.len(), master);
        self.install_kubeadm(hosts).await?;
        self.init_master(master).await?;

        if !workers.is_empty() {
            let join = self.executor.run_on("kubeadm token create --print-join-command", master).await?;
            if join.is_empty() {
                return Err(Error::ResourceFailed { name: master.to_string(), reason: "kubeadm printed no join command".to_string() });
            }
            log::info!("Joining {} worker(s)", workers.len());
            self.executor.run(&join, &workers).await?;
        }

        k8s.wait_ready("", ReadinessCondition::NodeReady, self.settings.node_ready_timeout, "default").await?;
        log::info!("Kubernetes cluster is ready");
        Ok(())
    }

    async fn install_kubeadm(&self, hosts: &[HostName]) -> Result<()> {
        self.packages.install(&["apt-transport-https", "ca-certificates", "curl", "gpg"], hosts).await?;

        let repo = format!("https://pkgs.k8s.io/core:/stable:/{}/deb/", self.settings.version);
        let prepare = format!(
            "swapoff -a && modprobe br_netfilter && sysctl -w net.bridge.bridge-nf-call-iptables=1 net.ipv4.ip_forward=1 \
             && mkdir -p /etc/apt/keyrings \
             && curl -fsSL {repo}Release.key | gpg --dearmor --yes -o /etc/apt/keyrings/kubernetes-apt-keyring.gpg \
             && echo 'deb [signed-by=/etc/apt/keyrings/kubernetes-apt-keyring.gpg] {repo} /' > /etc/apt/sources.list.d/kubernetes.list \
             && containerd config default > /etc/containerd/config.toml \
             && sed -i 's/SystemdCgroup = false/SystemdCgroup = true/' /etc/containerd/config.toml \
             && systemctl restart containerd",
            repo = repo
        );
        self.executor.run(&prepare, hosts).await?;

        self.packages.install(&["kubelet", "kubeadm", "kubectl"], hosts).await?;
        self.executor.run("apt-mark hold kubelet kubeadm kubectl", hosts).await?;
        Ok(())
    }

    async fn init_master(&self, master: &HostName) -> Result<()> {
        log::info!("Initialising control plane {}", master);
        let init = format!(
            "kubeadm init --pod-network-cidr={} \
             && mkdir -p $HOME/.kube && cp -f /etc/kubernetes/admin.conf $HOME/{}",
            self.settings.pod_network_cidr, REMOTE_KUBECONFIG
        );
        self.executor.run_on(&init, master).await?;
        self.executor.run_on(&format!("kubectl apply -f {}", self.settings.network_manifest_url), master).await?;
        Ok(())
    }

    /// Backs local persistent volumes on every worker with bind mounts of the scratch
    /// partition, applies the provisioner manifests of `volume_manifests` and waits for
    /// the provisioner pods.
    pub async fn setup_local_volumes(&self, workers: &[HostName], volume_manifests: &ManifestDir, k8s: &K8sResources) -> Result<()> {
        log::info!("Setting up {} local volume(s) on {} worker(s)", self.settings.volumes_per_worker, workers.len());
        let device = &self.settings.volume_device;
        self.executor.run(&format!("umount {device}; mount -t ext4 {device} /tmp", device = device), workers).await?;

        let bind = format!(
            "for i in $(seq 1 {}); do mkdir -p /tmp/pv/vol$i /mnt/disks/vol$i && mount --bind /tmp/pv/vol$i /mnt/disks/vol$i; done",
            self.settings.volumes_per_worker
        );
        self.executor.run(&bind, workers).await?;

        k8s.deploy_dir(volume_manifests, None).await?;
        k8s.wait_ready(
            "app.kubernetes.io/instance=local-volume-provisioner",
            ReadinessCondition::PodReady,
            self.settings.volume_provisioner_timeout,
            "default",
        )
        .await
    }

    /// Copies the admin kubeconfig of `master` into `local_dir/<master>/config`.
    pub async fn fetch_credentials(&self, master: &HostName, local_dir: &Path) -> Result<PathBuf> {
        self.transfer.get(std::slice::from_ref(master), &[REMOTE_KUBECONFIG.to_string()], local_dir).await?;
        let path = local_dir.join(master.as_str()).join("config");
        log::info!("Kubernetes credentials stored at {}", path.display());
        Ok(path)
    }
}
