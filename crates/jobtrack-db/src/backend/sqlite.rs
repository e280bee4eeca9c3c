use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    Sqlite, SqlitePool,
};
use tracing::debug;

use super::{
    Backend, COUNT_PAUSED_JOB, DELETE_PAUSED_JOB, INSERT_EXECUTION, INSERT_PAUSED_JOB,
    INSERT_SCHEMA_VERSION, SELECT_EXECUTIONS_BY_OUTCOME, SELECT_EXECUTIONS_FOR_JOB,
    SELECT_EXECUTION_STATS, SELECT_PAUSED_JOB_IDS, SELECT_SCHEMA_VERSION,
};
use crate::{
    config::DatabaseConfig,
    migration::Dialect,
    migrator::{MigrationPlan, MigrationTarget},
    models::{ExecutionRow, JobStatsRow},
    pool::pool_options,
    Error, Result,
};

pub const IN_MEMORY: &str = ":memory:";

/// Embedded backend over a database file, or a private in-memory database.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let database = config.database.as_deref().unwrap_or(IN_MEMORY);
        let mut pool = pool_options::<Sqlite>(config);

        let options = if database == IN_MEMORY {
            // The database disappears with its last connection, so keep
            // exactly one open for the lifetime of the pool.
            pool = pool
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(Error::Connection)?
        } else {
            SqliteConnectOptions::new()
                .filename(database)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(config.acquire_timeout())
        };

        let pool = pool.connect_with(options).await.map_err(Error::Connection)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl MigrationTarget for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        sqlx::query(statement).execute(&self.pool).await?;
        Ok(())
    }

    async fn schema_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar(SELECT_SCHEMA_VERSION)
            .fetch_optional(&self.pool)
            .await?;

        Ok(version.unwrap_or(0))
    }

    async fn apply_migrations(&self, plan: &MigrationPlan) -> Result<Vec<i16>> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(SELECT_SCHEMA_VERSION)
            .fetch_optional(&mut *tx)
            .await?;
        let current = current.unwrap_or(0);

        let mut applied = Vec::new();
        for step in plan
            .steps
            .iter()
            .filter(|step| i64::from(step.version) > current)
        {
            for statement in &step.statements {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|source| Error::Migration {
                        version: step.version,
                        source,
                    })?;
            }

            sqlx::query(INSERT_SCHEMA_VERSION)
                .bind(i64::from(step.version))
                .bind(plan.applied_at)
                .execute(&mut *tx)
                .await
                .map_err(|source| Error::Migration {
                    version: step.version,
                    source,
                })?;

            debug!(version = step.version, "Schema step executed");
            applied.push(step.version);
        }

        tx.commit().await?;
        Ok(applied)
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn insert_execution(&self, row: &ExecutionRow) -> Result<()> {
        sqlx::query(INSERT_EXECUTION)
            .bind(&row.id)
            .bind(&row.job)
            .bind(row.start_time)
            .bind(row.end_time)
            .bind(&row.context)
            .bind(row.success)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn executions_by_outcome(&self, success: bool) -> Result<Vec<ExecutionRow>> {
        let rows = sqlx::query_as::<_, ExecutionRow>(SELECT_EXECUTIONS_BY_OUTCOME)
            .bind(success)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn executions_for_job(&self, job: &str) -> Result<Vec<ExecutionRow>> {
        let rows = sqlx::query_as::<_, ExecutionRow>(SELECT_EXECUTIONS_FOR_JOB)
            .bind(job)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn execution_stats(&self) -> Result<Vec<JobStatsRow>> {
        let rows = sqlx::query_as::<_, JobStatsRow>(SELECT_EXECUTION_STATS)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn replace_paused_job(&self, job: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(DELETE_PAUSED_JOB)
            .bind(job)
            .execute(&mut *tx)
            .await?;

        sqlx::query(INSERT_PAUSED_JOB)
            .bind(job)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_paused_job(&self, job: &str) -> Result<u64> {
        let result = sqlx::query(DELETE_PAUSED_JOB)
            .bind(job)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn paused_job_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(SELECT_PAUSED_JOB_IDS)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn is_job_paused(&self, job: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(COUNT_PAUSED_JOB)
            .bind(job)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
