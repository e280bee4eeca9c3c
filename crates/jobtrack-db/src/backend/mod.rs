//! Driver-specific implementations behind one async interface.
//!
//! Backends speak storage shapes (`ExecutionRow`, naive timestamps, JSON
//! text); codecs and timeouts are applied by [`crate::Database`].

mod mysql;
mod sqlite;

use async_trait::async_trait;

use crate::{
    migrator::MigrationTarget,
    models::{ExecutionRow, JobStatsRow},
    Result,
};

pub use mysql::MySqlBackend;
pub use sqlite::SqliteBackend;

// MySQL and SQLite share `?` placeholders, so the statements below serve both.

const SELECT_SCHEMA_VERSION: &str =
    "SELECT schema_version FROM schema_evolutions ORDER BY schema_version DESC LIMIT 1";

const INSERT_SCHEMA_VERSION: &str =
    "INSERT INTO schema_evolutions (schema_version, schema_update) VALUES (?, ?)";

const INSERT_EXECUTION: &str = r#"
    INSERT INTO executions (id, job, start_time, end_time, context, success)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const SELECT_EXECUTIONS_BY_OUTCOME: &str = r#"
    SELECT id, job, start_time, end_time, context, success
    FROM executions
    WHERE success = ?
    ORDER BY end_time ASC, id ASC
"#;

const SELECT_EXECUTIONS_FOR_JOB: &str = r#"
    SELECT id, job, start_time, end_time, context, success
    FROM executions
    WHERE job = ?
    ORDER BY start_time ASC, id ASC
"#;

const SELECT_EXECUTION_STATS: &str = r#"
    SELECT
        job,
        COUNT(*) AS total,
        COUNT(CASE WHEN success THEN 1 END) AS succeeded,
        MAX(end_time) AS last_end_time
    FROM executions
    GROUP BY job
    ORDER BY job
"#;

const DELETE_PAUSED_JOB: &str = "DELETE FROM paused_jobs WHERE id = ?";

const INSERT_PAUSED_JOB: &str = "INSERT INTO paused_jobs (id) VALUES (?)";

const SELECT_PAUSED_JOB_IDS: &str = "SELECT id FROM paused_jobs";

const COUNT_PAUSED_JOB: &str = "SELECT COUNT(*) FROM paused_jobs WHERE id = ?";

/// Name of the MySQL advisory lock held while migrations run.
const MIGRATION_LOCK: &str = "jobtrack.schema_migration";

#[async_trait]
pub trait Backend: MigrationTarget {
    async fn insert_execution(&self, row: &ExecutionRow) -> Result<()>;

    async fn executions_by_outcome(&self, success: bool) -> Result<Vec<ExecutionRow>>;

    async fn executions_for_job(&self, job: &str) -> Result<Vec<ExecutionRow>>;

    async fn execution_stats(&self) -> Result<Vec<JobStatsRow>>;

    /// Delete-then-insert in a single transaction.
    async fn replace_paused_job(&self, job: &str) -> Result<()>;

    /// Returns the number of markers removed (0 or 1).
    async fn delete_paused_job(&self, job: &str) -> Result<u64>;

    async fn paused_job_ids(&self) -> Result<Vec<String>>;

    async fn is_job_paused(&self, job: &str) -> Result<bool>;

    /// Close every pooled connection; later calls fail.
    async fn close(&self);
}
