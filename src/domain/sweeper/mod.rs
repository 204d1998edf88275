pub mod combination;
pub mod param_sweeper;
pub mod parameter_space;
