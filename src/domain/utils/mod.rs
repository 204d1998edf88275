pub mod backoff;
pub mod id;
