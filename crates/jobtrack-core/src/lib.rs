pub mod execution;
pub mod error;

// Re-exports
pub use execution::{
    validate_job_id, ExecutionRecord, MAX_EXECUTION_ID_LEN, MAX_JOB_ID_CHAR_BYTES, MAX_JOB_ID_LEN,
};
pub use error::{Error, Result};
