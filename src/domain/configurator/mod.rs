pub mod docker;
pub mod k8s_resources;
pub mod kubernetes;
pub mod packages;
pub mod readiness;
pub mod roles;
