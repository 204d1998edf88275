pub mod configurator;
pub mod experiment;
pub mod manifest;
pub mod provisioner;
pub mod remote;
pub mod sweeper;
pub mod utils;
