pub mod cibench;
pub mod config;
pub mod driver;
pub mod run_context;
pub mod statistics;
pub mod workflow;
