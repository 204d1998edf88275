use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::domain::utils::id::HostName;
use crate::error::Result;

/// Copies files between the local machine and remote hosts.
#[async_trait]
pub trait FileTransfer: Debug + Send + Sync {
    /// Uploads every local path into `remote_dir` on every host.
    async fn put(&self, hosts: &[HostName], local_paths: &[PathBuf], remote_dir: &str) -> Result<()>;

    /// Downloads every remote path from every host into `local_dir/<host>/`.
    async fn get(&self, hosts: &[HostName], remote_paths: &[String], local_dir: &Path) -> Result<()>;
}
