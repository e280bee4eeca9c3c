use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

/// Width of the `executions.id` column; a hyphenated UUID fits exactly.
pub const MAX_EXECUTION_ID_LEN: usize = 36;

/// Width of the `job` columns in `executions` and `paused_jobs`.
pub const MAX_JOB_ID_LEN: usize = 1000;

/// Widest UTF-8 encoding allowed for a single job id character.
pub const MAX_JOB_ID_CHAR_BYTES: usize = 3;

/// One finished job run, as emitted by the scheduler.
///
/// Records are written once and never updated, so every field is public and
/// the type carries no mutating methods besides the builder-style `with_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub job: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub context: Value,
    pub success: bool,
}

impl ExecutionRecord {
    pub fn new(
        job: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        context: Value,
        success: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job: job.into(),
            start_time,
            end_time,
            context,
            success,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn duration(&self) -> Duration {
        self.end_time.signed_duration_since(self.start_time)
    }

    /// Check the record against the column widths and timing invariant
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.id.chars().count() > MAX_EXECUTION_ID_LEN {
            return Err(Error::InvalidRecord(format!(
                "execution id must be 1..={} characters, got {:?}",
                MAX_EXECUTION_ID_LEN, self.id
            )));
        }

        validate_job_id(&self.job)?;

        if self.start_time > self.end_time {
            return Err(Error::InvalidRecord(format!(
                "execution {} ends ({}) before it starts ({})",
                self.id, self.end_time, self.start_time
            )));
        }

        Ok(())
    }
}

/// Job ids share one width across `executions.job` and `paused_jobs.id`.
///
/// They also key the paused-jobs table, which MySQL stores as 3-byte utf8mb3
/// to fit the index limit, so characters outside the Basic Multilingual
/// Plane (emoji and the like) are rejected everywhere.
pub fn validate_job_id(job: &str) -> Result<()> {
    if job.is_empty() || job.chars().count() > MAX_JOB_ID_LEN {
        return Err(Error::InvalidJobId(format!(
            "job id must be 1..={} characters",
            MAX_JOB_ID_LEN
        )));
    }
    if let Some(c) = job.chars().find(|c| c.len_utf8() > MAX_JOB_ID_CHAR_BYTES) {
        return Err(Error::InvalidJobId(format!(
            "job id contains {:?} (U+{:04X}), which needs more than {} bytes",
            c, c as u32, MAX_JOB_ID_CHAR_BYTES
        )));
    }
    Ok(())
}
