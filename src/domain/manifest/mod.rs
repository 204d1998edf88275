pub mod builders;
pub mod template;
pub mod workspace;
