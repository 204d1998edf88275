use std::sync::Arc;

use crate::domain::configurator::k8s_resources::K8sResources;
use crate::domain::configurator::roles::RoleAssignment;
use crate::domain::provisioner::reservation::{HostSet, Reservation};
use crate::domain::remote::executor::CommandExecutor;
use crate::domain::remote::transfer::FileTransfer;
use crate::domain::utils::id::HostName;

/// Everything a sweep iteration needs from the environment set up by the driver.
///
/// Built once per provisioning; dropped when the reservation dies.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub reservation: Reservation,
    pub hosts: HostSet,
    pub assignment: RoleAssignment,
    pub k8s: K8sResources,
    pub executor: Arc<dyn CommandExecutor>,
    pub transfer: Arc<dyn FileTransfer>,
    pub namespace: String,
}

impl RunContext {
    pub fn master(&self) -> &HostName {
        self.k8s.master()
    }
}
