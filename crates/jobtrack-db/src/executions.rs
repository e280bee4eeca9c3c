use jobtrack_core::{validate_job_id, ExecutionRecord};
use tracing::debug;

use crate::{
    models::{ExecutionRow, JobExecutionStats},
    Database, Error, Result,
};

impl Database {
    /// Record one finished execution.
    ///
    /// Fails with [`Error::DuplicateExecution`] when the id is already stored;
    /// ids are never deduplicated or overwritten here.
    pub async fn log_execution(&self, record: &ExecutionRecord) -> Result<()> {
        record.validate()?;

        let row = ExecutionRow {
            id: record.id.clone(),
            job: record.job.clone(),
            start_time: self.timestamps.encode(&record.start_time),
            end_time: self.timestamps.encode(&record.end_time),
            context: self.documents.encode(&record.context),
            success: record.success,
        };

        match self
            .bounded("log_execution", self.backend.insert_execution(&row))
            .await
        {
            Err(e) if e.is_unique_violation() => Err(Error::DuplicateExecution(record.id.clone())),
            Err(e) => Err(e),
            Ok(()) => {
                debug!(id = %record.id, job = %record.job, success = record.success, "Execution logged");
                Ok(())
            }
        }
    }

    /// All executions with the given outcome, oldest `end_time` first
    pub async fn get_execution_log(&self, success: bool) -> Result<Vec<ExecutionRecord>> {
        let rows = self
            .bounded(
                "get_execution_log",
                self.backend.executions_by_outcome(success),
            )
            .await?;

        rows.into_iter().map(|row| self.decode_row(row)).collect()
    }

    /// History of one job, oldest `start_time` first
    pub async fn job_executions(&self, job: &str) -> Result<Vec<ExecutionRecord>> {
        validate_job_id(job)?;

        let rows = self
            .bounded("job_executions", self.backend.executions_for_job(job))
            .await?;

        rows.into_iter().map(|row| self.decode_row(row)).collect()
    }

    /// Per-job totals, ordered by job id
    pub async fn execution_stats(&self) -> Result<Vec<JobExecutionStats>> {
        let rows = self
            .bounded("execution_stats", self.backend.execution_stats())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| JobExecutionStats {
                failed: row.total - row.succeeded,
                job: row.job,
                total: row.total,
                succeeded: row.succeeded,
                last_finished_at: row.last_end_time.map(|t| self.timestamps.decode(t)),
            })
            .collect())
    }

    fn decode_row(&self, row: ExecutionRow) -> Result<ExecutionRecord> {
        let context = self
            .documents
            .decode(&row.context)
            .map_err(|source| Error::CorruptDocument {
                id: row.id.clone(),
                source,
            })?;

        Ok(ExecutionRecord {
            start_time: self.timestamps.decode(row.start_time),
            end_time: self.timestamps.decode(row.end_time),
            id: row.id,
            job: row.job,
            context,
            success: row.success,
        })
    }
}
