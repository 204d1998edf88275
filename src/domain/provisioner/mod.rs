pub mod g5k;
pub mod provisioner;
pub mod reservation;
pub mod scheduler_trait;
