pub mod command_result;
pub mod executor;
pub mod ssh;
pub mod transfer;
