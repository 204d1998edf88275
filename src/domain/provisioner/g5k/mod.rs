pub mod g5k_endpoint;
pub mod g5k_scheduler;
pub mod response;
