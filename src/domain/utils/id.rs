use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize)]
pub struct Id<T> {
    pub id: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Id { id: id.into(), _marker: PhantomData }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> From<Id<T>> for String {
    fn from(id_wrapper: Id<T>) -> Self {
        id_wrapper.id
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");

        write!(f, "{}: {:?}", display_name, self.id)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct HostTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct SiteTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct ClusterTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct JobTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct DeploymentTag;

pub type HostName = Id<HostTag>;
pub type SiteName = Id<SiteTag>;
pub type ClusterName = Id<ClusterTag>;
pub type JobId = Id<JobTag>;
pub type DeploymentId = Id<DeploymentTag>;

impl HostName {
    /// Testbed cluster a host belongs to: the part of the host name before the first `-`
    /// (`paravance-3.rennes.grid5000.fr` belongs to `paravance`).
    pub fn cluster(&self) -> ClusterName {
        let name = self.id.split('-').next().unwrap_or(&self.id);
        ClusterName::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_cluster_is_name_prefix() {
        let host = HostName::new("paravance-12.rennes.grid5000.fr");
        assert_eq!(host.cluster(), ClusterName::new("paravance"));
    }

    #[test]
    fn debug_shows_tag_name() {
        let job = JobId::new("1907");
        assert_eq!(format!("{:?}", job), "JobId: \"1907\"");
    }
}
