use std::collections::HashSet;

use jobtrack_core::validate_job_id;
use tracing::debug;

use crate::{Database, Result};

impl Database {
    /// Mark a job as paused; pausing an already paused job is a no-op
    pub async fn pause_job(&self, job: &str) -> Result<()> {
        validate_job_id(job)?;

        self.bounded("pause_job", self.backend.replace_paused_job(job))
            .await?;

        debug!(job, "Job paused");
        Ok(())
    }

    /// Clear a job's pause marker if it has one
    pub async fn unpause_job(&self, job: &str) -> Result<()> {
        // An id that fails validation can never have been paused
        if validate_job_id(job).is_err() {
            return Ok(());
        }

        let removed = self
            .bounded("unpause_job", self.backend.delete_paused_job(job))
            .await?;

        debug!(job, removed, "Job unpaused");
        Ok(())
    }

    pub async fn get_paused_job_ids(&self) -> Result<HashSet<String>> {
        let ids = self
            .bounded("get_paused_job_ids", self.backend.paused_job_ids())
            .await?;

        Ok(ids.into_iter().collect())
    }

    pub async fn is_job_paused(&self, job: &str) -> Result<bool> {
        if validate_job_id(job).is_err() {
            return Ok(false);
        }

        self.bounded("is_job_paused", self.backend.is_job_paused(job))
            .await
    }
}
