pub mod artifact_store;
pub mod job_store;
