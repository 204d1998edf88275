pub mod cibench_dto;
pub mod experiment_dto;
